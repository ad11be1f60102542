//! ONNX session loading shared by the face detector and region classifiers

use crate::DmsError;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{error, info};

/// Load an ONNX model with full graph optimisation
pub(crate) fn load_session(path: &str, what: &str) -> Result<Session, DmsError> {
    info!("Loading {} model from {}", what, path);

    let builder = Session::builder().map_err(|e| {
        error!("Failed to create session builder: {}", e);
        DmsError::ModelLoad(e.to_string())
    })?;

    let builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| {
            error!("Failed to configure model optimization: {}", e);
            DmsError::ModelLoad(e.to_string())
        })?;

    builder.commit_from_file(path).map_err(|e| {
        error!("Failed to load {} model: {}", what, e);
        DmsError::ModelLoad(format!("{}: {}", path, e))
    })
}

/// Run a single-input model and flatten its first output
pub(crate) fn run_first_output(
    session: &Session,
    input: ndarray::Array4<f32>,
) -> Result<Vec<f32>, DmsError> {
    let outputs = session
        .run(ort::inputs![input].map_err(|e| DmsError::Inference(e.to_string()))?)
        .map_err(|e| DmsError::Inference(e.to_string()))?;

    let tensor = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| DmsError::Inference(e.to_string()))?;

    Ok(tensor.iter().copied().collect())
}
