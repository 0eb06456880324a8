//! Export of meshes and fields to VTK unstructured grid files.
use crate::mesh::SimplexMesh;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, Piece, UnstructuredGridPiece,
    Version, VertexNumbers, Vtk,
};

/// Where a time-dependent simulation writes its snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtkOutput {
    pub directory: PathBuf,
    pub basename: String,
}

impl VtkOutput {
    pub fn new(directory: impl Into<PathBuf>, basename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            basename: basename.into(),
        }
    }

    /// The file of the snapshot at the given step, see [`snapshot_path`].
    pub fn snapshot_path(&self, step: usize) -> PathBuf {
        snapshot_path(&self.directory, &self.basename, step)
    }
}

/// The file `{directory}/{basename}_{step}.vtu`, with the step zero-padded to ten digits.
pub fn snapshot_path(directory: impl AsRef<Path>, basename: &str, step: usize) -> PathBuf {
    directory.as_ref().join(format!("{basename}_{step:010}.vtu"))
}

/// Returns the VTK cell type of first order simplices of the given dimension.
pub fn simplex_cell_type(top_dim: usize) -> eyre::Result<CellType> {
    match top_dim {
        1 => Ok(CellType::Line),
        2 => Ok(CellType::Triangle),
        3 => Ok(CellType::Tetra),
        _ => Err(eyre!("no VTK cell type for simplices of dimension {top_dim}")),
    }
}

struct NamedArray {
    name: String,
    num_components: usize,
    values: Vec<f64>,
}

impl NamedArray {
    fn into_attribute(self) -> Attribute {
        // Three component data is written as vectors so that it can be used for glyphs and warping
        let elem = if self.num_components == 3 {
            ElementType::Vectors
        } else {
            ElementType::Scalars {
                num_comp: self.num_components as u32,
                lookup_table: None,
            }
        };
        Attribute::DataArray(DataArray {
            name: self.name,
            elem,
            data: self.values.into(),
        })
    }
}

/// Builds a VTK data set from a mesh with attached point and cell data.
pub struct MeshDataSetBuilder<'a> {
    mesh: &'a SimplexMesh,
    point_data: Vec<NamedArray>,
    cell_data: Vec<NamedArray>,
    // Only used for exporting directly to file
    title: Option<String>,
}

impl<'a> MeshDataSetBuilder<'a> {
    pub fn from_mesh(mesh: &'a SimplexMesh) -> Self {
        Self {
            mesh,
            point_data: Vec::new(),
            cell_data: Vec::new(),
            title: None,
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Attaches data with `num_components` values per mesh node.
    pub fn with_point_scalar_attributes(
        mut self,
        name: impl Into<String>,
        num_components: usize,
        values: &[f64],
    ) -> Self {
        self.point_data.push(NamedArray {
            name: name.into(),
            num_components,
            values: values.to_vec(),
        });
        self
    }

    /// Attaches data with `num_components` values per cell.
    pub fn with_cell_scalar_attributes(
        mut self,
        name: impl Into<String>,
        num_components: usize,
        values: &[f64],
    ) -> Self {
        self.cell_data.push(NamedArray {
            name: name.into(),
            num_components,
            values: values.to_vec(),
        });
        self
    }

    fn check_attributes(arrays: &[NamedArray], count: usize, kind: &str) -> eyre::Result<()> {
        for array in arrays {
            if array.num_components == 0 || array.values.len() != count * array.num_components {
                return Err(eyre!(
                    "{kind} attribute `{}` has {} values, expected {} with {} components each",
                    array.name,
                    array.values.len(),
                    count,
                    array.num_components
                ));
            }
        }
        Ok(())
    }

    pub fn try_build(self) -> eyre::Result<(Option<String>, DataSet)> {
        let mesh = self.mesh;
        let (gd, td) = (mesh.geo_dimension(), mesh.top_dimension());
        if gd > 3 {
            return Err(eyre!("unable to export geometry dimension {gd} to VTK"));
        }
        Self::check_attributes(&self.point_data, mesh.number_of_nodes(), "point")?;
        Self::check_attributes(&self.cell_data, mesh.number_of_cells(), "cell")?;

        // VTK points always have three coordinates
        let mut points = Vec::with_capacity(3 * mesh.number_of_nodes());
        for i in 0..mesh.number_of_nodes() {
            points.extend_from_slice(mesh.node(i));
            points.extend(std::iter::repeat(0.0).take(3 - gd));
        }

        // Vertices is laid out as follows: N, i_1, i_2, ... i_N
        let cell_type = simplex_cell_type(td)?;
        let nv = td + 1;
        let mut vertices = Vec::with_capacity((nv + 1) * mesh.number_of_cells());
        for c in 0..mesh.number_of_cells() {
            vertices.push(u32::try_from(nv)?);
            for &v in mesh.cell(c) {
                vertices.push(u32::try_from(v)?);
            }
        }

        let piece = UnstructuredGridPiece {
            points: points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: u32::try_from(mesh.number_of_cells())?,
                    vertices,
                },
                types: vec![cell_type; mesh.number_of_cells()],
            },
            data: Attributes {
                point: self.point_data.into_iter().map(NamedArray::into_attribute).collect(),
                cell: self.cell_data.into_iter().map(NamedArray::into_attribute).collect(),
            },
        };

        let dataset = DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        };
        Ok((self.title, dataset))
    }

    /// Convenience function for directly exporting the dataset to a file.
    ///
    /// Missing parent directories are created.
    pub fn try_export(self, filename: impl AsRef<Path>) -> eyre::Result<()> {
        let filepath = filename.as_ref();
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (title, dataset) = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            // If we don't have a title then just make the file name the title
            title: title.unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .map_err(|err| eyre!("failed to export VTK file {}: {}", filepath.display(), err))?;
        Ok(())
    }
}
