/// Triangle mesh container for generated assets.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }
}

/// Axis-aligned box centered on the origin.
pub fn box_mesh(half_extents: [f64; 3]) -> MeshData {
    let [hx, hy, hz] = half_extents;
    let vertices = vec![
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [-hx, hy, -hz],
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
    ];
    let triangles = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [3, 0, 4],
        [3, 4, 7],
    ];
    MeshData {
        vertices,
        triangles,
    }
}

pub fn to_ascii_ply(mesh: &MeshData) -> String {
    let mut out = String::with_capacity(128 + mesh.vertices.len() * 24 + mesh.triangles.len() * 12);
    out.push_str("ply\nformat ascii 1.0\n");
    out.push_str(&format!("element vertex {}\n", mesh.vertices.len()));
    out.push_str("property float x\nproperty float y\nproperty float z\n");
    out.push_str(&format!("element face {}\n", mesh.triangles.len()));
    out.push_str("property list uchar uint vertex_indices\nend_header\n");
    for [x, y, z] in &mesh.vertices {
        out.push_str(&format!("{x} {y} {z}\n"));
    }
    for [a, b, c] in &mesh.triangles {
        out.push_str(&format!("3 {a} {b} {c}\n"));
    }
    out
}
