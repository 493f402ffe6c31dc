/// Events emitted while a build or sort runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A pipeline stage such as placement or area assignment begins.
    StageStart { name: &'static str },
    /// The running stage ended; `summary` is a one-line result.
    StageFinish { summary: String },

    /// Annealing begins; `iterations` is the expected number of swap trials.
    AnnealStart { iterations: u64, initial_length: f64 },
    /// `iterations` more swap trials ran; `best_length` is the shortest path so far in mm.
    AnnealAdvance { iterations: u64, best_length: f64 },
    AnnealFinish { best_length: f64 },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
