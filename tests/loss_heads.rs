use angular_margin::loss::angular::{blend_logits, replace_label_logits};
use angular_margin::loss::{multiple_angle_cos, EMBEDDING_WEIGHTS};
use angular_margin::{
    AngularSoftmax, LossHead, LossType, Matrix, Model, ModelConfig, ModifiedSoftmax, OriginalSoftmax, Param,
    ParamStore,
};
use approx::assert_abs_diff_eq;

/// D = 2, C = 10 with only the first two columns set: e_0 and e_1.
fn two_column_weights() -> Matrix {
    let mut w = Matrix::zeros(2, 10);
    w.data[0][0] = 1.0;
    w.data[1][1] = 1.0;
    w
}

/// Unit vectors spread around the circle, column 0 pointing along +x.
fn ring_weights(scale: f64) -> Matrix {
    let mut w = Matrix::zeros(2, 10);
    for j in 0..10 {
        let phi = 2.0 * std::f64::consts::PI * j as f64 / 10.0;
        w.data[0][j] = scale * phi.cos();
        w.data[1][j] = scale * phi.sin();
    }
    w
}

fn embeddings_at_degrees(radius: f64, degrees: &[f64]) -> Matrix {
    Matrix::from_data(
        degrees
            .iter()
            .map(|d| {
                let t = d.to_radians();
                vec![radius * t.cos(), radius * t.sin()]
            })
            .collect(),
    )
}

#[test]
fn original_softmax_matches_hand_computation() {
    let embeddings = Matrix::from_data(vec![
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![2.0, 0.0],
        vec![0.5, 0.5],
    ]);
    let labels = [0, 1, 0, 1];

    let mut store = ParamStore::seeded(0);
    store.insert(EMBEDDING_WEIGHTS, Param::from_matrix(&two_column_weights()));
    let config = ModelConfig { loss_type: LossType::Original, ..ModelConfig::default() };
    let model = Model::from_embeddings(embeddings, &labels, &config, &mut store).unwrap();

    // eight zero logits contribute exp(0) = 1 each
    let e = std::f64::consts::E;
    let per_sample = [
        (e + 9.0).ln() - 1.0,
        (e + 9.0).ln() - 1.0,
        (e * e + 9.0).ln() - 2.0,
        (2.0 * e.sqrt() + 8.0).ln() - 0.5,
    ];
    let expected = per_sample.iter().sum::<f64>() / 4.0;
    assert_abs_diff_eq!(model.loss(), expected, epsilon = 1e-4);

    assert_abs_diff_eq!(model.pred_prob().data[0][0], e / (e + 9.0), epsilon = 1e-12);
    // row 3 ties between classes 0 and 1; the lower index wins
    assert_eq!(model.predictions(), &[0, 1, 0, 0]);
    assert_abs_diff_eq!(model.accuracy(), 0.75);
    assert_eq!(model.regularization_loss(), 0.0);
}

#[test]
fn probabilities_sum_to_one_for_every_head() {
    let embeddings = Matrix::from_data(vec![
        vec![0.3, -2.0],
        vec![5.0, 1.0],
        vec![-0.7, 0.1],
        vec![12.0, -9.0],
    ]);
    let labels = [3, 0, 7, 9];
    let w = ring_weights(0.8);
    let heads: Vec<Box<dyn LossHead>> = vec![
        Box::new(OriginalSoftmax::with_weights(w.clone())),
        Box::new(ModifiedSoftmax::with_weights(w.clone())),
        Box::new(AngularSoftmax::with_weights(w, 1.0)),
    ];
    for head in heads {
        let out = head.forward(&embeddings, &labels);
        assert!(out.loss.is_finite() && out.loss >= 0.0);
        for row in &out.pred_prob.data {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
        }
    }
}

#[test]
fn normalized_weight_columns_have_unit_norm() {
    let w = Matrix::from_data(vec![
        vec![0.01, -3.0, 7.5, 0.2, 1.0],
        vec![0.02, 4.0, -0.5, 0.0, 1.0],
    ]);
    let modified = ModifiedSoftmax::with_weights(w.clone()).normalized_weights();
    let angular = AngularSoftmax::with_weights(w, 1.0).normalized_weights();
    for norm in modified.column_norms().into_iter().chain(angular.column_norms()) {
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn psi_has_no_distortion_at_zero_angle() {
    assert_eq!(multiple_angle_cos(1.0), 1.0);
    // the quadruple-angle polynomial itself is symmetric in cos(theta); the
    // sign terms push theta = pi down to -7
    assert_eq!(multiple_angle_cos(-1.0), -7.0);
}

#[test]
fn margin_never_raises_a_positive_true_class_logit() {
    let degrees = [0.0, 30.0, 45.0, 60.0, 89.0, 90.0];
    let embeddings = embeddings_at_degrees(2.5, &degrees);
    let labels = vec![0; degrees.len()];
    let head = AngularSoftmax::with_weights(ring_weights(3.0), 1.0);
    let terms = head.terms(&embeddings, &labels);

    for (i, d) in degrees.iter().enumerate() {
        assert_abs_diff_eq!(terms.cos_theta[i], d.to_radians().cos(), epsilon = 1e-12);
        assert!(terms.cos_theta[i] >= -1e-12);
        assert!(
            terms.margin_logits[i] <= terms.selected_logits[i] + 1e-12,
            "margin raised the logit at {d} degrees"
        );
    }
    // theta = 0: untouched; 30 deg: cos(120 deg); 45 deg: cos(180 deg); 90 deg: psi = -3
    assert_abs_diff_eq!(terms.margin_logits[0], 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(terms.margin_logits[1], -1.25, epsilon = 1e-9);
    assert_abs_diff_eq!(terms.margin_logits[2], -2.5, epsilon = 1e-9);
    assert_abs_diff_eq!(terms.margin_logits[5], -7.5, epsilon = 1e-9);
}

#[test]
fn margin_only_touches_the_true_label_column() {
    let embeddings = embeddings_at_degrees(1.5, &[10.0, 200.0, 75.0]);
    let labels = [0, 4, 2];
    let head = AngularSoftmax::with_weights(ring_weights(1.0), 1.0);
    let terms = head.terms(&embeddings, &labels);

    for (i, &label) in labels.iter().enumerate() {
        for j in 0..10 {
            let original = terms.original_logits.data[i][j];
            let updated = terms.updated_logits.data[i][j];
            if j == label {
                assert_abs_diff_eq!(terms.combined_logits.data[i][j], terms.margin_logits[i], epsilon = 1e-12);
                assert_abs_diff_eq!(updated, 0.5 * original + 0.5 * terms.margin_logits[i], epsilon = 1e-12);
            } else {
                assert_abs_diff_eq!(updated, original, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn gather_scatter_plumbing_is_lossless_without_margin() {
    let embeddings = embeddings_at_degrees(3.0, &[5.0, 95.0, 170.0, 260.0]);
    let labels = [1, 3, 5, 9];
    let head = AngularSoftmax::with_weights(ring_weights(2.0), 1.0);
    let terms = head.terms(&embeddings, &labels);

    let same = replace_label_logits(&terms.original_logits, &labels, &terms.selected_logits, &terms.selected_logits);
    assert_eq!(same, terms.original_logits);

    let unblended = blend_logits(&terms.original_logits, &terms.combined_logits, 0.0);
    assert_eq!(unblended, terms.original_logits);

    // lambda -> infinity gives f = 0
    let no_margin = AngularSoftmax::with_weights(ring_weights(2.0), f64::INFINITY);
    assert_eq!(no_margin.terms(&embeddings, &labels).updated_logits, terms.original_logits);
}

#[test]
fn angular_loss_exceeds_modified_loss_on_aligned_samples() {
    let embeddings = embeddings_at_degrees(4.0, &[20.0, 100.0]);
    let labels = [0, 3];
    let w = ring_weights(1.0);
    let modified = ModifiedSoftmax::with_weights(w.clone()).forward(&embeddings, &labels);
    let angular = AngularSoftmax::with_weights(w, 1.0).forward(&embeddings, &labels);
    assert!(angular.loss > modified.loss);
}

#[test]
fn zero_embedding_propagates_nan() {
    let embeddings = Matrix::from_data(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    let labels = [0, 1];
    let head = AngularSoftmax::with_weights(ring_weights(1.0), 1.0);
    let terms = head.terms(&embeddings, &labels);
    assert!(terms.cos_theta[0].is_nan());
    assert!(terms.updated_logits.data[0][0].is_nan());
    assert!(terms.cos_theta[1].is_finite());

    let out = head.forward(&embeddings, &labels);
    assert!(out.loss.is_nan());
    assert!(out.pred_prob.data[0].iter().all(|p| p.is_nan()));
}
