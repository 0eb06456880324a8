//! Loading of simplicial meshes from Gmsh MSH files.
use crate::mesh::SimplexMesh;
use eyre::{eyre, Context};
use log::{debug, warn};
use std::path::Path;

/// Loads a [`SimplexMesh`] from a Gmsh MSH file at the given path.
///
/// Only elements of the simplex type matching `top_dim` (`Lin2`, `Tri3` or `Tet4`) on entities of
/// dimension `top_dim` become cells. Node coordinates are truncated to `geo_dim` components.
pub fn load_msh_from_file<P: AsRef<Path>>(file_path: P, top_dim: usize, geo_dim: usize) -> eyre::Result<SimplexMesh> {
    let msh_bytes = std::fs::read(file_path).wrap_err("failed to read file")?;
    load_msh_from_bytes(&msh_bytes, top_dim, geo_dim).wrap_err("failed to load mesh from msh file")
}

/// Returns the MSH element type of first order simplices of the given dimension.
fn simplex_element_type(top_dim: usize) -> eyre::Result<mshio::ElementType> {
    match top_dim {
        1 => Ok(mshio::ElementType::Lin2),
        2 => Ok(mshio::ElementType::Tri3),
        3 => Ok(mshio::ElementType::Tet4),
        _ => Err(eyre!("no simplex element type of dimension {top_dim} in MSH files")),
    }
}

/// Loads a [`SimplexMesh`] by parsing the given bytes as a Gmsh MSH file.
pub fn load_msh_from_bytes(bytes: &[u8], top_dim: usize, geo_dim: usize) -> eyre::Result<SimplexMesh> {
    if geo_dim == 0 || geo_dim > 3 {
        return Err(eyre!("geometry dimension must be 1, 2 or 3, got {geo_dim}"));
    }
    let element_type = simplex_element_type(top_dim)?;
    let mut msh_file = mshio::parse_msh_bytes(bytes).map_err(|e| eyre!("failed to parse msh file: {}", e))?;

    let msh_nodes = msh_file
        .data
        .nodes
        .take()
        .ok_or(eyre!("MSH file does not contain nodes"))?;
    let msh_elements = msh_file
        .data
        .elements
        .take()
        .ok_or(eyre!("MSH file does not contain elements"))?;

    let mut nodes = Vec::new();
    let mut truncated_coordinates = false;
    for node_block in &msh_nodes.node_blocks {
        // Tags are only stored when they are not consecutive
        if node_block.node_tags.is_some() {
            return Err(eyre!("node block tags are not consecutive in msh file"));
        }
        for node in &node_block.nodes {
            let coordinates = [node.x, node.y, node.z];
            truncated_coordinates |= coordinates[geo_dim..].iter().any(|&x| x != 0.0);
            nodes.extend_from_slice(&coordinates[..geo_dim]);
        }
    }
    if truncated_coordinates {
        warn!("Non-zero node coordinates beyond dimension {geo_dim} are ignored.");
    }
    let num_nodes = nodes.len() / geo_dim;

    let mut cells = Vec::new();
    for element_block in &msh_elements.element_blocks {
        let entity_dim = usize::try_from(element_block.entity_dim)
            .map_err(|_| eyre!("invalid element block entity dimension {}", element_block.entity_dim))?;
        if element_block.element_type != element_type || entity_dim != top_dim {
            // Blocks of other types, e.g. boundary facets, are not part of the mesh
            continue;
        }
        for element in &element_block.elements {
            if element.nodes.len() < top_dim + 1 {
                return Err(eyre!("not enough nodes to initialize connectivity"));
            }
            for &tag in &element.nodes[..=top_dim] {
                // Node tags start at 1
                let index = usize::try_from(tag)
                    .ok()
                    .and_then(|tag| tag.checked_sub(1))
                    .filter(|&index| index < num_nodes)
                    .ok_or_else(|| eyre!("element refers to unknown node tag {tag}"))?;
                cells.push(index);
            }
        }
    }
    if cells.is_empty() {
        return Err(eyre!(
            "MSH file does not contain an element block of the requested type ({:?} of dim {})",
            element_type,
            top_dim
        ));
    }

    debug!(
        "Loaded {} nodes and {} cells from MSH data",
        num_nodes,
        cells.len() / (top_dim + 1)
    );
    Ok(SimplexMesh::from_nodes_and_cells(geo_dim, top_dim, nodes, cells)?)
}
