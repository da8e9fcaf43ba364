// Deletion queue
//
// Resources register a destroy step right after they are created. Flushing
// runs the steps newest-first, so teardown always mirrors construction.
// create_all gives batches of per-image resources the same guarantee when
// one of them fails to build.

/// LIFO list of named destroy steps.
#[derive(Default)]
pub struct DeletionQueue {
    steps: Vec<(&'static str, Box<dyn FnOnce()>)>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &'static str, step: impl FnOnce() + 'static) {
        self.steps.push((name, Box::new(step)));
    }

    /// Step names in registration order; `flush` runs them back to front.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in reverse registration order.
    pub fn flush(&mut self) {
        while let Some((name, step)) = self.steps.pop() {
            log::debug!("Destroying {}", name);
            step();
        }
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Build `count` resources with `create`.
///
/// If one fails, the ones already built are handed to `release` newest-first
/// and the error is returned.
pub fn create_all<T>(
    count: usize,
    mut create: impl FnMut(usize) -> anyhow::Result<T>,
    mut release: impl FnMut(T),
) -> anyhow::Result<Vec<T>> {
    let mut built = Vec::with_capacity(count);
    for i in 0..count {
        match create(i) {
            Ok(item) => built.push(item),
            Err(e) => {
                while let Some(item) = built.pop() {
                    release(item);
                }
                return Err(e);
            }
        }
    }
    Ok(built)
}
