use log::info;

use crate::{error::EngineError, shader::KernelKey};

/**
The most recently compiled kernel and the key it was compiled for.

Keys compare by value, so a fresh configuration that differs only in runtime
parameters (or not at all) reuses the compiled kernel. Replacing the entry
drops the previous kernel.
*/
pub struct KernelCache<A> {
    entry: Option<(KernelKey, A)>,
    compile_count: usize,
}

impl<A> Default for KernelCache<A> {
    fn default() -> Self {
        Self {
            entry: None,
            compile_count: 0,
        }
    }
}

impl<A> KernelCache<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `compile` has succeeded.
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn key(&self) -> Option<KernelKey> {
        self.entry.as_ref().map(|(key, _)| *key)
    }

    pub fn get_or_compile(
        &mut self,
        key: KernelKey,
        compile: impl FnOnce(KernelKey) -> Result<A, EngineError>,
    ) -> Result<&A, EngineError> {
        let entry = match self.entry.take() {
            Some((cached, kernel)) if cached == key => (cached, kernel),
            previous => {
                if let Some((previous, _)) = previous {
                    info!("recompiling kernel: {:?} -> {:?}", previous, key);
                } else {
                    info!("compiling kernel {:?}", key);
                }
                let kernel = compile(key)?;
                self.compile_count += 1;
                (key, kernel)
            }
        };
        Ok(&self.entry.insert(entry).1)
    }
}
