//! Cross-artifact consistency
//!
//! A consumer holding only the exported files must decode the same label
//! for the same class index, whichever artifact it reads.

use signaura_nmf_core::{
    feature_names, Activation, ClassicalModel, Classifier, DenseLayer, LabelCodec, Layer,
    ModelBundle, NetworkModel, Node, PortableNetwork, RandomForestModel, Tree,
};
use tempfile::TempDir;

fn codec() -> LabelCodec {
    LabelCodec::fit(["question", "affirmation", "negation", "affirmation"])
}

/// Stump forest: head_nod -> affirmation, head_shake -> negation, else question
fn forest() -> RandomForestModel {
    let tree = Tree::new(vec![
        Node::internal(3, 0.5, 1, 2),
        Node::internal(4, 0.5, 3, 4),
        Node::leaf(vec![1.0, 0.0, 0.0]),
        Node::leaf(vec![0.0, 0.0, 1.0]),
        Node::leaf(vec![0.0, 1.0, 0.0]),
    ]);
    RandomForestModel {
        n_classes: 3,
        n_features: 6,
        trees: vec![tree.clone(), tree],
        feature_importances: vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.0],
    }
}

fn network() -> NetworkModel {
    NetworkModel {
        input_dim: 6,
        layers: vec![
            Layer::Dense(DenseLayer {
                input_dim: 6,
                units: 3,
                activation: Activation::Relu,
                weights: vec![
                    0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                    1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                ],
                bias: vec![0.0; 3],
            }),
            Layer::Dropout { rate: 0.3 },
            Layer::Dense(DenseLayer {
                input_dim: 3,
                units: 3,
                activation: Activation::Softmax,
                weights: vec![
                    4.0, 0.0, 0.0, //
                    0.0, 4.0, 0.0, //
                    0.0, 0.0, 4.0,
                ],
                bias: vec![0.0; 3],
            }),
        ],
    }
}

#[test]
fn test_all_artifacts_agree_on_labels() {
    let dir = TempDir::new().unwrap();
    let codec = codec();
    assert_eq!(codec.classes().to_vec(), vec!["affirmation", "negation", "question"]);

    let bundle = ModelBundle::new(
        ClassicalModel::RandomForest(forest()),
        codec.clone(),
        feature_names(),
        48,
        1_700_000_000,
    )
    .unwrap();
    let bundle_path = dir.path().join("nmf_classifier.bin");
    bundle.save(&bundle_path).unwrap();

    let mapping_path = dir.path().join("label_mapping.json");
    codec.write_mapping(&mapping_path).unwrap();

    let network_dir = dir.path().join("nmf_model");
    PortableNetwork::new(network(), codec.clone(), feature_names())
        .unwrap()
        .save(&network_dir, "artifact-consistency-test")
        .unwrap();

    let bundle = ModelBundle::load(&bundle_path).unwrap();
    let mapping = LabelCodec::read_mapping(&mapping_path).unwrap();
    let portable = PortableNetwork::load(&network_dir).unwrap();
    assert_eq!(bundle.codec(), &mapping);
    assert_eq!(portable.codec, mapping);
    assert_eq!(portable.feature_names, feature_names());

    // Both models decode head nod / head shake the same way.
    for (features, expected) in [
        ([0.0, 0.0, 0.0, 1.0, 0.0, 0.0], "affirmation"),
        ([0.0, 0.0, 0.0, 0.0, 1.0, 0.0], "negation"),
        ([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], "question"),
    ] {
        assert_eq!(bundle.predict_label(&features).unwrap().label, expected);
        let index = portable.network.predict(&features).unwrap();
        assert_eq!(mapping.decode(index).unwrap(), expected);
    }
}

#[test]
fn test_feature_dimension_is_enforced() {
    let bundle = ModelBundle::new(
        ClassicalModel::RandomForest(forest()),
        codec(),
        feature_names(),
        48,
        0,
    )
    .unwrap();
    assert!(bundle.predict_label(&[1.0, 0.0]).is_err());
    assert_eq!(bundle.feature_importances().map(|s| s.len()), Some(6));
}
