//! Step functions for dense stereo initialization.
//!
//! Each step reads what the previous one left in `session.state`, so they
//! must run in order: [`step_preprocess`], [`step_predict`], [`step_align`],
//! [`step_fuse`]. [`run_dense_init`] chains all four.
//!
//! Fatal failures are returned as [`PipelineError`] inside the
//! `anyhow::Error` and recorded in the session log before returning.

use std::path::Path;

use anyhow::{Context, Result};
use dense_prior_core::Device;
use dense_prior_io::save_ply_atomic;
use log::{info, warn};

use crate::aligner::{AlignmentRequest, GlobalAligner, build_anchors, run_alignment};
use crate::error::PipelineError;
use crate::fusion::{cap_density, fuse_views};
use crate::graph::complete_symmetric_pairs;
use crate::predictor::{PairPredictor, predict_pairs};
use crate::preprocess::{PreparedView, preprocess_view};
use crate::session::PriorSession;

use super::problem::{DenseInitOutput, DenseInitProblem};

type Session = PriorSession<DenseInitProblem>;

/// Record `err` under `operation` and hand it back for propagation.
fn fail(session: &mut Session, operation: &str, err: PipelineError) -> anyhow::Error {
    session.log_failure(operation, err.to_string());
    err.into()
}

/// Resize and crop every selected view and derive its intrinsics and pose.
///
/// Resets all later stages.
///
/// # Errors
///
/// - Input not set or invalid config
/// - [`PipelineError::DegenerateCrop`] / [`PipelineError::InvalidView`] for a
///   view that cannot be processed
pub fn step_preprocess(session: &mut Session) -> Result<()> {
    session.validate()?;
    let mode = session.config.resize_mode();
    let input = session.require_input()?;

    let prepared = input
        .views
        .iter()
        .enumerate()
        .map(|(i, view)| preprocess_view(view, i, mode))
        .collect::<Result<Vec<PreparedView>, PipelineError>>();
    let prepared = match prepared {
        Ok(p) => p,
        Err(e) => return Err(fail(session, "preprocess", e)),
    };

    let notes = match prepared.first() {
        Some(p) => format!(
            "{} views, first {}x{} ({mode:?})",
            prepared.len(),
            p.view.width(),
            p.view.height()
        ),
        None => "0 views".to_string(),
    };
    session.state.clear_downstream();
    session.state.prepared = Some(prepared);
    session.log_success_with_notes("preprocess", notes);
    Ok(())
}

/// Run the predictor over the complete symmetric pair graph.
///
/// # Errors
///
/// - [`step_preprocess`] has not run
/// - [`PipelineError::NotEnoughViews`] with fewer than two views
/// - [`PipelineError::Predictor`] when any batch fails; no partial
///   predictions are stored
pub fn step_predict<P: PairPredictor + ?Sized>(
    session: &mut Session,
    predictor: &mut P,
    device: &Device,
) -> Result<()> {
    let prepared = session
        .state
        .prepared
        .as_ref()
        .context("step_preprocess must run before step_predict")?;
    if prepared.len() < 2 {
        let err = PipelineError::NotEnoughViews(prepared.len());
        return Err(fail(session, "predict", err));
    }

    let pairs = complete_symmetric_pairs(prepared.len());
    let predictions = match predict_pairs(
        predictor,
        prepared,
        &pairs,
        session.config.batch_size,
        device,
    ) {
        Ok(p) => p,
        Err(e) => return Err(fail(session, "predict", e)),
    };

    session.state.pairs_predicted = predictions.len();
    session.state.alignment = None;
    session.state.pairs = Some(pairs);
    session.state.predictions = Some(predictions);
    session.log_success_with_notes(
        "predict",
        format!("{} pairs on {device}", session.state.pairs_predicted),
    );
    Ok(())
}

/// Anchor every view and run the global aligner over all predictions.
///
/// Consumes the stored predictions on success. When the aligner fails they
/// are put back, so the step can be retried without predicting again.
///
/// # Errors
///
/// - [`step_predict`] has not run
/// - [`PipelineError::Aligner`] or an inconsistent aligner result
pub fn step_align<A: GlobalAligner + ?Sized>(
    session: &mut Session,
    aligner: &mut A,
    device: &Device,
) -> Result<()> {
    let anchors = build_anchors(
        session
            .state
            .prepared
            .as_ref()
            .context("step_preprocess must run before step_align")?,
    );
    let predictions = session
        .state
        .predictions
        .take()
        .context("step_predict must run before step_align")?;

    let request = AlignmentRequest {
        anchors,
        predictions,
        options: session.config.align,
    };
    let result = match run_alignment(aligner, &request, device) {
        Ok(r) => r,
        Err(e) => {
            session.state.predictions = Some(request.predictions);
            return Err(fail(session, "align", e));
        }
    };
    drop(request);

    session.state.align_iterations = result.iterations;
    session.state.align_loss = result.final_loss;
    session.log_success_with_notes(
        "align",
        format!(
            "{} views, {} iterations",
            result.views.len(),
            result.iterations
        ),
    );
    session.state.alignment = Some(result);
    Ok(())
}

/// Fuse confident points, cap the density, and write the artifact.
///
/// The artifact is written atomically; an existing file at `artifact` is
/// only replaced by a complete one. Sets the session output and releases the
/// per-view buffers.
///
/// # Errors
///
/// - [`step_align`] has not run
/// - [`PipelineError::ArtifactWrite`] on storage failure
pub fn step_fuse(session: &mut Session, artifact: &Path) -> Result<()> {
    let alignment = session
        .state
        .alignment
        .as_ref()
        .context("step_align must run before step_fuse")?;
    let prepared = session
        .state
        .prepared
        .as_ref()
        .context("step_preprocess must run before step_fuse")?;

    let view_shapes = prepared.iter().map(|p| p.view.true_shape).collect();
    let (cloud, mut stats) = match fuse_views(prepared, &alignment.views) {
        Ok(r) => r,
        Err(e) => return Err(fail(session, "fuse", e)),
    };

    let (capped, stride) = cap_density(&cloud, session.config.max_points);
    drop(cloud);
    stats.stride = stride;
    stats.kept_points = capped.len();
    if capped.is_empty() {
        warn!("no confident points in any view, writing an empty artifact");
    }

    if let Err(source) = save_ply_atomic(artifact, &capped, session.config.encoding) {
        let err = PipelineError::ArtifactWrite {
            path: artifact.to_path_buf(),
            source,
        };
        return Err(fail(session, "fuse", err));
    }
    info!(
        "wrote {} points to {} ({} views used, {} skipped)",
        capped.len(),
        artifact.display(),
        stats.views_used,
        stats.skipped_views.len()
    );

    let source_indices = session.require_input()?.source_indices.clone();
    let output = DenseInitOutput {
        source_indices,
        view_shapes,
        pairs_predicted: session.state.pairs_predicted,
        align_iterations: session.state.align_iterations,
        align_loss: session.state.align_loss,
        fusion: stats,
        artifact: artifact.to_path_buf(),
    };
    session.state.prepared = None;
    session.state.pairs = None;
    session.state.alignment = None;
    session.log_success_with_notes(
        "fuse",
        format!(
            "{} -> {} points (stride {})",
            output.fusion.fused_points, output.fusion.kept_points, output.fusion.stride
        ),
    );
    session.set_output(output);
    Ok(())
}

/// Run all stages in order and write the artifact to `artifact`.
pub fn run_dense_init<P, A>(
    session: &mut Session,
    predictor: &mut P,
    aligner: &mut A,
    device: &Device,
    artifact: &Path,
) -> Result<()>
where
    P: PairPredictor + ?Sized,
    A: GlobalAligner + ?Sized,
{
    step_preprocess(session)?;
    step_predict(session, predictor, device)?;
    step_align(session, aligner, device)?;
    step_fuse(session, artifact)?;
    Ok(())
}
