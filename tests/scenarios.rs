//! End-to-end mirroring scenarios against the in-memory scene.

#![allow(clippy::unwrap_used)]

use cluster_mirror::error::OperationError;
use cluster_mirror::math::{Point3, Vector3};
use cluster_mirror::operations::{
    BuildPointIndex, CopyClusters, FindMirrorCorrespondence, MemberWeight, MirrorClusters,
};
use cluster_mirror::scene::{DeformerId, MemoryScene, Node, PointId, Scene};
use cluster_mirror::MirrorError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quad() -> Vec<Point3> {
    vec![
        Point3::new(-1.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(-1.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ]
}

fn envelopes(scene: &MemoryScene) -> Vec<(DeformerId, f64)> {
    scene.deformers().map(|(id, d)| (id, d.envelope)).collect()
}

#[test]
fn four_vertex_quad_correspondence() {
    init_tracing();
    let mut scene = MemoryScene::new();
    let mesh = scene.add_mesh("quad", quad());
    let index = BuildPointIndex::new(mesh).execute(&scene).unwrap();
    let sources = [MemberWeight {
        point: PointId::vertex(mesh, 1),
        position: Point3::new(1.0, 0.0, 0.0),
        weight: 0.5,
    }];

    let map = FindMirrorCorrespondence::new(&sources)
        .execute(&index)
        .unwrap();

    assert_eq!(map.iter().collect::<Vec<_>>(), vec![(PointId::vertex(mesh, 0), 0.5)]);
    assert_eq!(
        index.position(PointId::vertex(mesh, 0)),
        Some(Point3::new(-1.0, 0.0, 0.0))
    );
}

#[test]
fn index_copy_onto_matching_topology() {
    init_tracing();
    let mut scene = MemoryScene::new();
    let a = scene.add_mesh("A", quad());
    let b = scene.add_mesh(
        "B",
        quad().into_iter().map(|p| p + Vector3::new(0.0, 0.0, 9.0)).collect(),
    );
    let (_, handle) = scene
        .add_cluster(&[(PointId::vertex(a, 3), 0.8)])
        .unwrap();

    let report = CopyClusters::new(vec![Node::Handle(handle)], b)
        .execute(&mut scene)
        .unwrap();

    let created = report.created[0].deformer;
    assert_eq!(scene.weight(created, PointId::vertex(b, 3)).unwrap(), 0.8);
    assert_eq!(scene.output_geometries(created).unwrap(), vec![b]);
}

#[test]
fn unsupported_geometry_leaves_every_envelope_alone() {
    init_tracing();
    let mut scene = MemoryScene::new();
    let mesh = scene.add_mesh("quad", quad());
    let surface = scene.add_other_shape("nurbsPlaneShape1", "nurbsSurface");
    let ffd = scene.add_deformer("ffd1", "ffd", vec![mesh]).unwrap();
    scene.set_envelope(ffd, 0.5).unwrap();
    let (_, first) = scene
        .add_cluster(&[(PointId::vertex(mesh, 1), 1.0)])
        .unwrap();
    let (bad, second) = scene
        .add_cluster(&[(PointId::vertex(mesh, 3), 1.0)])
        .unwrap();
    scene.deformer_mut(bad).unwrap().geometries.push(surface);
    let before = envelopes(&scene);

    let err = MirrorClusters::new(vec![first, second])
        .execute(&mut scene)
        .unwrap_err();

    assert!(matches!(
        err,
        MirrorError::Operation(OperationError::UnsupportedGeometryKind { .. })
    ));
    assert_eq!(envelopes(&scene), before);
}

#[test]
fn colliding_sources_keep_the_last_weight() {
    init_tracing();
    let mut scene = MemoryScene::new();
    let mesh = scene.add_mesh(
        "lopsided",
        vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.9, 0.0, 0.0),
            Point3::new(1.1, 0.0, 0.0),
        ],
    );
    let (_, handle) = scene
        .add_cluster(&[
            (PointId::vertex(mesh, 1), 0.3),
            (PointId::vertex(mesh, 2), 0.6),
        ])
        .unwrap();

    let report = MirrorClusters::new(vec![handle]).execute(&mut scene).unwrap();

    let created = scene.deformer(report.created[0].deformer).unwrap();
    assert_eq!(created.members, vec![PointId::vertex(mesh, 0)]);
    assert_eq!(created.weights[&PointId::vertex(mesh, 0)], 0.6);
}

#[test]
fn envelopes_restored_after_several_clusters() {
    init_tracing();
    let mut scene = MemoryScene::new();
    let mesh = scene.add_mesh("quad", quad());
    let lattice = scene.add_lattice(
        "ffd1Lattice",
        [2, 2, 2],
        Point3::new(-1.0, -1.0, -1.0),
        Point3::new(1.0, 1.0, 1.0),
    );
    let (c1, h1) = scene
        .add_cluster(&[(PointId::vertex(mesh, 1), 1.0)])
        .unwrap();
    let (c2, h2) = scene
        .add_cluster(&[(PointId::lattice_point(lattice, [1, 0, 1]), 0.4)])
        .unwrap();
    let (c3, h3) = scene
        .add_cluster(&[(PointId::vertex(mesh, 3), 0.9)])
        .unwrap();
    scene.set_envelope(c1, 0.2).unwrap();
    scene.set_envelope(c2, 0.7).unwrap();
    for h in [h1, h2, h3] {
        scene.handle_mut(h).unwrap().offset = Vector3::new(0.5, 0.5, 0.0);
    }

    let report = MirrorClusters::new(vec![h1, h2, h3])
        .execute(&mut scene)
        .unwrap();

    assert_eq!(report.created.len(), 3);
    assert_eq!(scene.envelope(c1).unwrap(), 0.2);
    assert_eq!(scene.envelope(c2).unwrap(), 0.7);
    assert_eq!(scene.envelope(c3).unwrap(), 1.0);
    let created: Vec<f64> = report
        .created
        .iter()
        .map(|c| scene.envelope(c.deformer).unwrap())
        .collect();
    assert_eq!(created, vec![0.2, 0.7, 1.0]);
    assert_eq!(
        scene.deformer(report.created[1].deformer).unwrap().members,
        vec![PointId::lattice_point(lattice, [0, 0, 1])]
    );
}
