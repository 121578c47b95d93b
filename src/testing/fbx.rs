//! Minimal binary FBX writer for test fixtures.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// A property value to write. Array variants carry a "compress" flag.
pub enum Prop {
    I64(i64),
    F64(f64),
    Str(String),
    Raw(Vec<u8>),
    I32Array(Vec<i32>, bool),
    F64Array(Vec<f64>, bool),
}

pub struct Node {
    pub name: String,
    pub props: Vec<Prop>,
    pub children: Vec<Node>,
}

pub fn node(name: &str, props: Vec<Prop>, children: Vec<Node>) -> Node {
    Node {
        name: name.to_string(),
        props,
        children,
    }
}

fn leaf(name: &str, prop: Prop) -> Node {
    node(name, vec![prop], vec![])
}

fn s(value: &str) -> Prop {
    Prop::Str(value.to_string())
}

pub fn properties70(entries: Vec<Node>) -> Node {
    node("Properties70", vec![], entries)
}

pub fn p_vec3(name: &str, value: [f64; 3]) -> Node {
    node(
        "P",
        vec![
            s(name),
            s("Vector3D"),
            s("Vector"),
            s(""),
            Prop::F64(value[0]),
            Prop::F64(value[1]),
            Prop::F64(value[2]),
        ],
        vec![],
    )
}

pub fn p_f64(name: &str, value: f64) -> Node {
    node("P", vec![s(name), s("double"), s("Number"), s(""), Prop::F64(value)], vec![])
}

fn write_array(out: &mut Vec<u8>, code: u8, count: usize, raw: Vec<u8>, compress: bool) {
    out.push(code);
    out.extend_from_slice(&(count as u32).to_le_bytes());
    let payload = if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap()
    } else {
        raw
    };
    out.extend_from_slice(&(compress as u32).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
}

fn write_prop(out: &mut Vec<u8>, prop: &Prop) {
    match prop {
        Prop::I64(v) => {
            out.push(b'L');
            out.extend_from_slice(&v.to_le_bytes());
        }
        Prop::F64(v) => {
            out.push(b'D');
            out.extend_from_slice(&v.to_le_bytes());
        }
        Prop::Str(v) => {
            out.push(b'S');
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
        Prop::Raw(v) => {
            out.push(b'R');
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v);
        }
        Prop::I32Array(values, compress) => {
            let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            write_array(out, b'i', values.len(), raw, *compress);
        }
        Prop::F64Array(values, compress) => {
            let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            write_array(out, b'd', values.len(), raw, *compress);
        }
    }
}

fn write_header_field(out: &mut Vec<u8>, at: usize, value: u64, wide: bool) {
    if wide {
        out[at..at + 8].copy_from_slice(&value.to_le_bytes());
    } else {
        out[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
    }
}

fn write_node(out: &mut Vec<u8>, node: &Node, wide: bool) {
    let field = if wide { 8 } else { 4 };
    let start = out.len();
    out.extend(std::iter::repeat(0u8).take(field * 3));
    out.push(node.name.len() as u8);
    out.extend_from_slice(node.name.as_bytes());

    let props_start = out.len();
    for prop in &node.props {
        write_prop(out, prop);
    }
    let props_len = out.len() - props_start;

    if !node.children.is_empty() {
        for child in &node.children {
            write_node(out, child, wide);
        }
        write_null_record(out, wide);
    }

    let end = out.len() as u64;
    write_header_field(out, start, end, wide);
    write_header_field(out, start + field, node.props.len() as u64, wide);
    write_header_field(out, start + field * 2, props_len as u64, wide);
}

fn write_null_record(out: &mut Vec<u8>, wide: bool) {
    let len = if wide { 25 } else { 13 };
    out.extend(std::iter::repeat(0u8).take(len));
}

/// Encode top-level records into a binary FBX file.
pub fn encode(version: u32, nodes: &[Node]) -> Vec<u8> {
    let wide = version >= 7500;
    let mut out = Vec::new();
    out.extend_from_slice(b"Kaydara FBX Binary  \0");
    out.extend_from_slice(&[0x1A, 0x00]);
    out.extend_from_slice(&version.to_le_bytes());
    for node in nodes {
        write_node(&mut out, node, wide);
    }
    write_null_record(&mut out, wide);
    out
}

fn object(class: &str, id: i64, name: &str, sub_class: &str, children: Vec<Node>) -> Node {
    node(
        class,
        vec![Prop::I64(id), s(&format!("{}\u{0}\u{1}{}", name, class)), s(sub_class)],
        children,
    )
}

fn connect(child: i64, parent: i64) -> Node {
    node("C", vec![s("OO"), Prop::I64(child), Prop::I64(parent)], vec![])
}

fn connect_property(child: i64, parent: i64, property: &str) -> Node {
    node("C", vec![s("OP"), Prop::I64(child), Prop::I64(parent), s(property)], vec![])
}

fn material(id: i64, name: &str, color: [f64; 3]) -> Node {
    object(
        "Material",
        id,
        name,
        "",
        vec![properties70(vec![p_vec3("DiffuseColor", color), p_f64("Shininess", 20.0)])],
    )
}

/// A 2-unit cube translated to (10, 0, 0), optionally with an embedded
/// diffuse texture.
pub fn cube_fbx(version: u32, texture_png: Option<Vec<u8>>) -> Vec<u8> {
    let mut vertices = Vec::new();
    for i in 0..8 {
        vertices.push(if i & 1 != 0 { 1.0 } else { -1.0 });
        vertices.push(if i & 2 != 0 { 1.0 } else { -1.0 });
        vertices.push(if i & 4 != 0 { 1.0 } else { -1.0 });
    }
    let quads: [[i32; 4]; 6] = [
        [0, 4, 6, 2],
        [1, 3, 7, 5],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 2, 3, 1],
        [4, 5, 7, 6],
    ];
    let mut polygon_index = Vec::new();
    let mut uvs = Vec::new();
    for quad in &quads {
        polygon_index.extend_from_slice(&[quad[0], quad[1], quad[2], !quad[3]]);
        uvs.extend_from_slice(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    }

    let geometry = object(
        "Geometry",
        100,
        "cube",
        "Mesh",
        vec![
            leaf("Vertices", Prop::F64Array(vertices, true)),
            leaf("PolygonVertexIndex", Prop::I32Array(polygon_index, true)),
            node(
                "LayerElementUV",
                vec![],
                vec![
                    leaf("MappingInformationType", s("ByPolygonVertex")),
                    leaf("ReferenceInformationType", s("Direct")),
                    leaf("UV", Prop::F64Array(uvs, false)),
                ],
            ),
            node(
                "LayerElementMaterial",
                vec![],
                vec![
                    leaf("MappingInformationType", s("AllSame")),
                    leaf("ReferenceInformationType", s("IndexToDirect")),
                    leaf("Materials", Prop::I32Array(vec![0], false)),
                ],
            ),
        ],
    );
    let model = object(
        "Model",
        200,
        "cube",
        "Mesh",
        vec![properties70(vec![p_vec3("Lcl Translation", [10.0, 0.0, 0.0])])],
    );

    let mut objects = vec![geometry, model, material(300, "red", [0.8, 0.2, 0.2])];
    let mut connections = vec![connect(200, 0), connect(100, 200), connect(300, 200)];

    if let Some(png) = texture_png {
        objects.push(object(
            "Texture",
            400,
            "albedo",
            "",
            vec![leaf("RelativeFilename", s("albedo.png"))],
        ));
        objects.push(object("Video", 500, "albedo", "Clip", vec![leaf("Content", Prop::Raw(png))]));
        connections.push(connect_property(400, 300, "DiffuseColor"));
        connections.push(connect(500, 400));
    }

    encode(
        version,
        &[
            node("FBXHeaderExtension", vec![], vec![leaf("FBXVersion", Prop::I64(version as i64))]),
            node("Objects", vec![], objects),
            node("Connections", vec![], connections),
        ],
    )
}

/// A quad made of two triangles, each assigned a different material.
pub fn two_material_quad_fbx() -> Vec<u8> {
    let geometry = object(
        "Geometry",
        10,
        "quad",
        "Mesh",
        vec![
            leaf(
                "Vertices",
                Prop::F64Array(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0], false),
            ),
            leaf("PolygonVertexIndex", Prop::I32Array(vec![0, 1, !2, 0, 2, !3], false)),
            node(
                "LayerElementMaterial",
                vec![],
                vec![
                    leaf("MappingInformationType", s("ByPolygon")),
                    leaf("ReferenceInformationType", s("IndexToDirect")),
                    leaf("Materials", Prop::I32Array(vec![0, 1], false)),
                ],
            ),
        ],
    );
    let model = object("Model", 20, "quad", "Mesh", vec![]);

    encode(
        7400,
        &[
            node(
                "Objects",
                vec![],
                vec![
                    geometry,
                    model,
                    material(30, "a", [1.0, 0.0, 0.0]),
                    material(31, "b", [0.0, 0.0, 1.0]),
                ],
            ),
            node(
                "Connections",
                vec![],
                vec![connect(20, 0), connect(10, 20), connect(30, 20), connect(31, 20)],
            ),
        ],
    )
}
