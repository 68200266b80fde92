use capsnet::{
    config::CapsuleConfig,
    layers::{CapsuleLayer, Length, LayerTrait, Mask, WeightInit},
    CapsError,
};
use ndarray::{array, s, Array1, Array2, Array3, Array5, ArrayD, ArrayView1, ArrayView2, Axis};

const BATCH: usize = 2;
const INPUT_CAPS: usize = 4;
const INPUT_DIM: usize = 3;
const NUM_CAPS: usize = 2;
const CAPS_DIM: usize = 5;

fn fixed_input() -> Array3<f32> {
    Array3::from_shape_fn((BATCH, INPUT_CAPS, INPUT_DIM), |(b, i, k)| {
        (((b * 12 + i * 3 + k) % 7) as f32 - 3.0) / 4.0
    })
}

fn fixed_weights() -> Array5<f32> {
    Array5::from_shape_fn((1, INPUT_CAPS, NUM_CAPS, CAPS_DIM, INPUT_DIM), |(_, i, j, d, k)| {
        (((i * 30 + j * 15 + d * 3 + k) % 11) as f32 - 5.0) / 10.0
    })
}

fn fixed_layer(routing_iterations: usize) -> CapsuleLayer {
    CapsuleLayer::new(NUM_CAPS, CAPS_DIM, routing_iterations, WeightInit::default())
        .unwrap()
        .with_weights(fixed_weights())
        .unwrap()
}

#[test]
fn test_end_to_end_reference_output() {
    let mut layer = fixed_layer(3);
    let output = layer.forward(fixed_input().view()).unwrap();

    let expected = array![
        [
            [0.22283922f32, -0.05437307, -0.04443225, -0.06216747, 0.06677585],
            [0.03050016, -0.10816421, 0.02997922, -0.06149022, 0.21971860],
        ],
        [
            [-0.01797133, 0.17850073, -0.27889719, 0.44353154, -0.02567411],
            [-0.01287136, -0.13523678, 0.08579485, 0.04859911, -0.12160804],
        ],
    ];
    assert_eq!(output.dim(), (BATCH, NUM_CAPS, CAPS_DIM));
    for (a, e) in output.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "got {}, expected {}", a, e);
    }

    let lengths = Length::new().forward(&output).unwrap();
    assert_eq!(lengths.dim(), (BATCH, NUM_CAPS));
    for &l in lengths.iter() {
        assert!((0.0..1.0).contains(&l));
    }
    assert!((lengths[[0, 0]] - 0.25082221).abs() < 1e-5);
    assert!((lengths[[1, 0]] - 0.55439021).abs() < 1e-5);
}

#[test]
fn test_routing_is_deterministic() {
    let layer = fixed_layer(4);
    let input = fixed_input();
    let first = layer.route(input.view()).unwrap();
    let second = layer.route(input.view()).unwrap();
    assert_eq!(first, second);

    // Seeded initialization is reproducible too
    let mut config = CapsuleConfig::new(NUM_CAPS, CAPS_DIM, 3);
    config.seed = Some(11);
    let mut a = CapsuleLayer::from_config(config.clone()).unwrap();
    let mut b = CapsuleLayer::from_config(config).unwrap();
    assert_eq!(
        a.forward(input.view()).unwrap(),
        b.forward(input.view()).unwrap()
    );
}

/// Every input capsule votes along the same direction for output 0 and
/// along evenly spread directions for output 1.
fn clustered_layer(routing_iterations: usize) -> CapsuleLayer {
    let input_caps = 6;
    let weights = Array5::from_shape_fn((1, input_caps, 2, 2, 2), |(_, i, j, d, k)| {
        if j == 0 {
            if d == k { 1.0 + 0.05 * i as f32 } else { 0.0 }
        } else {
            let angle = (i as f32 * 60.0).to_radians();
            match (d, k) {
                (0, 0) | (1, 1) => angle.cos(),
                (0, 1) => -angle.sin(),
                _ => angle.sin(),
            }
        }
    });
    CapsuleLayer::new(2, 2, routing_iterations, WeightInit::default())
        .unwrap()
        .with_weights(weights)
        .unwrap()
}

fn coupling_weighted_cosine(layer: &CapsuleLayer, input: &Array3<f32>) -> f32 {
    let routed = layer.route_with_coupling(input.view()).unwrap();
    let weights = layer.weights().unwrap();
    let (batch, input_caps, _) = input.dim();

    let mut total = 0.0;
    let mut mass = 0.0;
    for b in 0..batch {
        for i in 0..input_caps {
            for j in 0..2 {
                let u = input.index_axis(Axis(0), b);
                let w: ArrayView2<f32> = weights.slice(s![0, i, j, .., ..]);
                let vote: Array1<f32> = w.dot(&u.row(i));
                let out: ArrayView1<f32> = routed.capsules.slice(s![b, j, ..]);
                let denom = (vote.dot(&vote) * out.dot(&out)).sqrt();
                let cosine = if denom > 0.0 { vote.dot(&out) / denom } else { 0.0 };
                let c = routed.coupling[[b, i, j, 0]];
                total += c * cosine;
                mass += c;
            }
        }
    }
    total / mass
}

#[test]
fn test_more_iterations_increase_agreement() {
    let input = Array3::from_shape_fn((2, 6, 2), |(b, _, k)| {
        if k == 0 { 1.0 + 0.1 * b as f32 } else { 0.5 }
    });

    let scores: Vec<f32> = (1..=5)
        .map(|t| coupling_weighted_cosine(&clustered_layer(t), &input))
        .collect();

    assert!((scores[0] - 0.5).abs() < 1e-3, "uniform routing starts at {}", scores[0]);
    for pair in scores.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-4, "agreement decreased: {:?}", scores);
    }
    assert!(scores[4] > 0.9);
}

#[test]
fn test_classification_and_reconstruction_heads() {
    let mut layer = fixed_layer(3);
    let capsules = layer.forward(fixed_input().view()).unwrap();

    let mut labels = Array2::<f32>::zeros((BATCH, NUM_CAPS));
    labels[[0, 1]] = 1.0;
    labels[[1, 0]] = 1.0;
    let decoder_input = Mask::new().forward(capsules.view(), labels.view()).unwrap();
    assert_eq!(decoder_input.dim(), (BATCH, NUM_CAPS * CAPS_DIM));

    let reshaped = decoder_input.into_shape((BATCH, NUM_CAPS, CAPS_DIM)).unwrap();
    for b in 0..BATCH {
        for j in 0..NUM_CAPS {
            let row = reshaped.slice(ndarray::s![b, j, ..]);
            if labels[[b, j]] == 1.0 {
                assert_eq!(row, capsules.slice(ndarray::s![b, j, ..]));
            } else {
                assert!(row.iter().all(|&v| v == 0.0));
            }
        }
    }
}

#[test]
fn test_host_graph_through_layer_trait() {
    let mut graph: Vec<Box<dyn LayerTrait>> = vec![
        Box::new(CapsuleLayer::new(NUM_CAPS, CAPS_DIM, 3, WeightInit::XavierUniform).unwrap()),
        Box::new(Length::new()),
    ];

    let input: ArrayD<f32> = fixed_input().into_dyn();
    let shapes: [&[usize]; 1] = [input.shape()];
    assert_eq!(graph[0].output_shape(&shapes).unwrap(), vec![BATCH, NUM_CAPS, CAPS_DIM]);

    let mut current = input;
    for layer in graph.iter_mut() {
        current = layer.forward(&[current.view()]).unwrap();
    }
    assert_eq!(current.shape(), &[BATCH, NUM_CAPS]);
    assert_eq!(graph[1].name(), "length");

    // Rank-2 input never reaches the routing code
    let flat = Array2::<f32>::zeros((BATCH, INPUT_CAPS * INPUT_DIM)).into_dyn();
    let mut fresh = CapsuleLayer::new(NUM_CAPS, CAPS_DIM, 3, WeightInit::default()).unwrap();
    let err = LayerTrait::forward(&mut fresh, &[flat.view()]).unwrap_err();
    assert!(matches!(err, CapsError::RankMismatch { .. }));
    assert!(!fresh.is_built());
}
