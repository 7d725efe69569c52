use std::sync::Mutex;

use crate::photo::Photo;

/// Default strftime pattern for stored photo names.
pub const DEFAULT_NAME_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Generates unique base names for stored photos.
///
/// Uniqueness is guaranteed per instance across its call sequence, even
/// under concurrent callers.
pub trait Namer: Send + Sync {
    fn name(&self, photo: &Photo) -> String;
}

impl<F> Namer for F
where
    F: Fn(&Photo) -> String + Send + Sync,
{
    fn name(&self, photo: &Photo) -> String {
        self(photo)
    }
}

/// Names photos after their creation timestamp.
///
/// When two photos format to the same stamp the second and following
/// get an incrementing `_1`, `_2`, … suffix. The last stamp and counter
/// are one locked unit so concurrent calls cannot hand out the same
/// name.
pub struct DateNamer {
    format: String,
    state: Mutex<NamerState>,
}

#[derive(Default)]
struct NamerState {
    last: String,
    counter: u32,
}

impl DateNamer {
    pub fn new(format: impl Into<String>) -> Self {
        DateNamer {
            format: format.into(),
            state: Mutex::new(NamerState::default()),
        }
    }
}

impl Namer for DateNamer {
    fn name(&self, photo: &Photo) -> String {
        let stamp = photo.created_at().format(&self.format).to_string();
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if stamp == state.last {
            state.counter += 1;
            format!("{}_{}", stamp, state.counter)
        } else {
            state.last = stamp.clone();
            state.counter = 0;
            stamp
        }
    }
}
