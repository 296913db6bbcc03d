use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::error::ModelError;
use crate::features::{Scaler, FEATURE_NAMES, FEATURE_VERSION, N_FEATURES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "linear_regression")]
    LinearRegression,
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "hist_gbm")]
    HistGbm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LinearRegression,
        ModelKind::RandomForest,
        ModelKind::HistGbm,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::HistGbm => "hist_gbm",
        }
    }
}

/// A trained fare regressor. Implementations are immutable after load.
pub trait Regressor: Send + Sync {
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn check(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != N_FEATURES {
            return Err(ModelError::DimensionMismatch {
                expected: N_FEATURES,
                got: self.coefficients.len(),
            });
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_width(x, self.coefficients.len())?;
        let dot: f64 = self.coefficients.iter().zip(x).map(|(w, v)| w * v).sum();
        Ok(self.intercept + dot)
    }
}

/// Split or leaf. Leaves carry `feature == -1` and `left == right == -1`.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub feature: i32,
    #[serde(default)]
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_true")]
    pub missing_go_to_left: bool,
}

fn default_true() -> bool {
    true
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.feature < 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Structural check done once at load. Children must come after their
    /// parent, which rules out cycles.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if !node.value.is_finite() {
                    return Err(format!("leaf {} has non-finite value", i));
                }
                continue;
            }
            if node.feature as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {} of {}",
                    i, node.feature, n_features
                ));
            }
            for child in [node.left, node.right] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("node {} has invalid child {}", i, child));
                }
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, x: &[f64]) -> Result<f64, String> {
        let mut idx = 0usize;
        // bounded walk: a validated tree reaches a leaf in fewer steps
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| format!("node index {} out of range", idx))?;
            if node.is_leaf() {
                return Ok(node.value);
            }
            let v = *x
                .get(node.feature as usize)
                .ok_or_else(|| format!("feature {} out of range", node.feature))?;
            let go_left = if v.is_nan() { node.missing_go_to_left } else { v <= node.threshold };
            let next = if go_left { node.left } else { node.right };
            if next < 0 {
                return Err(format!("internal node {} has no child", idx));
            }
            idx = next as usize;
        }
        Err("traversal did not reach a leaf".to_string())
    }
}

fn validate_trees(trees: &[Tree]) -> Result<(), ModelError> {
    if trees.is_empty() {
        return Err(ModelError::MalformedTree { tree: 0, reason: "model has no trees".to_string() });
    }
    for (i, t) in trees.iter().enumerate() {
        t.validate(N_FEATURES)
            .map_err(|reason| ModelError::MalformedTree { tree: i, reason })?;
    }
    Ok(())
}

fn sum_trees(trees: &[Tree], x: &[f64]) -> Result<f64, ModelError> {
    let mut acc = 0.0;
    for (i, t) in trees.iter().enumerate() {
        acc += t.evaluate(x).map_err(|reason| ModelError::MalformedTree { tree: i, reason })?;
    }
    Ok(acc)
}

/// Bagged regression trees; output is the mean over trees.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomForestModel {
    pub trees: Vec<Tree>,
}

impl Regressor for RandomForestModel {
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_width(x, N_FEATURES)?;
        Ok(sum_trees(&self.trees, x)? / self.trees.len() as f64)
    }
}

/// Histogram gradient boosting. Leaf values already include the learning
/// rate, so the output is the baseline plus the sum over trees.
#[derive(Debug, Clone, Deserialize)]
pub struct HistGbmModel {
    pub baseline: f64,
    pub trees: Vec<Tree>,
}

impl Regressor for HistGbmModel {
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_width(x, N_FEATURES)?;
        Ok(self.baseline + sum_trees(&self.trees, x)?)
    }
}

fn check_width(x: &[f64], expected: usize) -> Result<(), ModelError> {
    if x.len() != expected {
        return Err(ModelError::DimensionMismatch { expected, got: x.len() });
    }
    Ok(())
}

#[derive(Deserialize)]
struct Manifest {
    feature_version: u32,
    feature_names: Vec<String>,
    #[serde(default)]
    scaler: Option<Scaler>,
    models: BTreeMap<ModelKind, String>,
}

/// One ensemble member. `model` is `None` when the artifact failed to load.
pub struct ModelSlot {
    pub kind: ModelKind,
    pub model: Option<Box<dyn Regressor>>,
}

impl ModelSlot {
    pub fn loaded<R: Regressor + 'static>(kind: ModelKind, model: R) -> Self {
        Self { kind, model: Some(Box::new(model)) }
    }

    pub fn unavailable(kind: ModelKind) -> Self {
        Self { kind, model: None }
    }
}

/// Everything read from the artifact directory at start-up.
pub struct ModelArtifacts {
    pub scaler: Option<Scaler>,
    pub slots: Vec<ModelSlot>,
}

impl ModelArtifacts {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest_path = dir.join("manifest.json");
        let txt = fs::read_to_string(&manifest_path)
            .with_context(|| format!("failed to read manifest at {}", manifest_path.display()))?;
        let manifest: Manifest =
            serde_json::from_str(&txt).with_context(|| "failed to parse manifest.json")?;

        if manifest.feature_version != FEATURE_VERSION {
            bail!(
                "artifacts built for feature version {}, engine expects {}",
                manifest.feature_version,
                FEATURE_VERSION
            );
        }
        if manifest.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            bail!(
                "artifact feature order {:?} does not match engine order {:?}",
                manifest.feature_names,
                FEATURE_NAMES
            );
        }
        if let Some(s) = &manifest.scaler {
            s.check().map_err(anyhow::Error::msg).context("invalid scaler in manifest")?;
        }

        let slots = ModelKind::ALL
            .into_iter()
            .map(|kind| match manifest.models.get(&kind) {
                None => {
                    tracing::warn!("no artifact listed for {}; marking unavailable", kind.key());
                    ModelSlot::unavailable(kind)
                }
                Some(file) => {
                    let path = dir.join(file);
                    tracing::info!("loading model {}: {}", kind.key(), path.display());
                    match load_regressor(kind, &path) {
                        Ok(model) => ModelSlot { kind, model: Some(model) },
                        Err(e) => {
                            tracing::warn!("could not load {}: {}", path.display(), e);
                            ModelSlot::unavailable(kind)
                        }
                    }
                }
            })
            .collect();

        Ok(Self { scaler: manifest.scaler, slots })
    }
}

fn load_regressor(kind: ModelKind, path: &Path) -> Result<Box<dyn Regressor>, ModelError> {
    let txt = fs::read_to_string(path)?;
    Ok(match kind {
        ModelKind::LinearRegression => {
            let m: LinearModel = serde_json::from_str(&txt)?;
            m.check()?;
            Box::new(m)
        }
        ModelKind::RandomForest => {
            let m: RandomForestModel = serde_json::from_str(&txt)?;
            validate_trees(&m.trees)?;
            Box::new(m)
        }
        ModelKind::HistGbm => {
            let m: HistGbmModel = serde_json::from_str(&txt)?;
            validate_trees(&m.trees)?;
            Box::new(m)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64) -> Node {
        Node {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value,
            missing_go_to_left: true,
        }
    }

    fn stump(feature: i32, threshold: f64, lo: f64, hi: f64) -> Tree {
        Tree {
            nodes: vec![
                Node {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    value: 0.0,
                    missing_go_to_left: true,
                },
                leaf(lo),
                leaf(hi),
            ],
        }
    }

    fn x(miles: f64) -> Vec<f64> {
        let mut v = vec![0.0; N_FEATURES];
        v[0] = miles;
        v
    }

    #[test]
    fn linear_is_intercept_plus_dot() {
        let mut coefficients = vec![0.0; N_FEATURES];
        coefficients[0] = 2.0;
        coefficients[3] = 4.0;
        let m = LinearModel { intercept: 3.0, coefficients };
        let mut input = x(5.0);
        input[3] = 0.5;
        assert_eq!(m.predict(&input).unwrap(), 15.0);
    }

    #[test]
    fn linear_rejects_wrong_width() {
        let m = LinearModel { intercept: 0.0, coefficients: vec![1.0; N_FEATURES] };
        assert!(matches!(
            m.predict(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { expected: N_FEATURES, got: 2 })
        ));
        let short = LinearModel { intercept: 0.0, coefficients: vec![1.0; 3] };
        assert!(short.check().is_err());
    }

    #[test]
    fn tree_goes_left_on_equal_threshold() {
        let t = stump(0, 2.0, 10.0, 20.0);
        assert_eq!(t.evaluate(&x(2.0)).unwrap(), 10.0);
        assert_eq!(t.evaluate(&x(2.5)).unwrap(), 20.0);
    }

    #[test]
    fn nan_follows_missing_direction() {
        let mut t = stump(0, 2.0, 10.0, 20.0);
        assert_eq!(t.evaluate(&x(f64::NAN)).unwrap(), 10.0);
        t.nodes[0].missing_go_to_left = false;
        assert_eq!(t.evaluate(&x(f64::NAN)).unwrap(), 20.0);
    }

    #[test]
    fn forest_averages_and_gbm_sums() {
        let rf = RandomForestModel {
            trees: vec![stump(0, 2.0, 10.0, 20.0), stump(0, 4.0, 12.0, 30.0)],
        };
        assert_eq!(rf.predict(&x(3.0)).unwrap(), 16.0);

        let gbm = HistGbmModel {
            baseline: 15.0,
            trees: vec![stump(0, 2.0, -1.0, 2.0), stump(0, 4.0, -0.5, 1.5)],
        };
        assert_eq!(gbm.predict(&x(3.0)).unwrap(), 16.5);
    }

    #[test]
    fn validation_catches_bad_structure() {
        let mut backwards = stump(0, 1.0, 1.0, 2.0);
        backwards.nodes[0].left = 0;
        assert!(backwards.validate(N_FEATURES).is_err());

        let wide = stump(N_FEATURES as i32, 1.0, 1.0, 2.0);
        assert!(wide.validate(N_FEATURES).is_err());

        assert!(Tree { nodes: vec![] }.validate(N_FEATURES).is_err());
        assert!(validate_trees(&[]).is_err());
        assert!(stump(3, 0.5, 1.0, 2.0).validate(N_FEATURES).is_ok());
    }

    #[test]
    fn unvalidated_tree_errors_instead_of_panicking() {
        let mut t = stump(0, 1.0, 1.0, 2.0);
        t.nodes[0].right = 99;
        assert!(t.evaluate(&x(5.0)).is_err());
    }

    #[test]
    fn model_kind_keys_match_serde_names() {
        for kind in ModelKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
        }
    }
}
