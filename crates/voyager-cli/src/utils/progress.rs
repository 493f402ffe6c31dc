use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use voyager::engine::progress::{Progress, ProgressCallback};

const SPINNER_TICK_MS: u64 = 80;

/// Renders build and sort events on stderr.
///
/// Stages show as a spinner that ends in a check mark with the stage
/// summary; annealing shows as an iteration bar carrying the best stage
/// path found so far.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(Self::stage_style());
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(pb) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::StageStart { name } => {
                    pb.reset();
                    pb.set_length(0);
                    pb.set_style(Self::stage_style());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb.set_message(format!("{}...", name));
                }
                Progress::StageFinish { summary } => {
                    pb.disable_steady_tick();
                    pb.set_style(Self::stage_style());
                    pb.finish_with_message(format!("✓ {}", summary));
                }
                Progress::AnnealStart {
                    iterations,
                    initial_length,
                } => {
                    pb.disable_steady_tick();
                    pb.reset();
                    pb.set_length(iterations);
                    pb.set_position(0);
                    pb.set_style(Self::anneal_style());
                    pb.set_message(format_length(initial_length));
                }
                Progress::AnnealAdvance {
                    iterations,
                    best_length,
                } => {
                    pb.inc(iterations);
                    pb.set_message(format_length(best_length));
                }
                Progress::AnnealFinish { best_length } => {
                    // The cooling schedule may stop short of the estimate.
                    pb.set_length(pb.position());
                    pb.finish_with_message(format_length(best_length));
                }
            }
        })
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn anneal_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "Annealing [{bar:40.cyan/blue}] {human_pos}/{human_len} swaps, best {msg} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        )
        .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn format_length(mm: f64) -> String {
    format!("{:.3} mm", mm)
}
