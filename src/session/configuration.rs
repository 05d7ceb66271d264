// SPDX-License-Identifier: GPL-3.0-only

//! Scoped configuration bracket
//!
//! [`ConfigurationGuard`] opens a begin/commit bracket on a backend. Changes
//! made through the guard are undone if it is dropped without `commit()`,
//! so an early `?` return never leaves a half-configured session behind.

use crate::backends::camera::{
    BackendResult, CameraBackend, CameraDevice, OutputKind, SessionPreset,
};
use tracing::{debug, warn};

pub struct ConfigurationGuard<'a, B: CameraBackend + ?Sized> {
    backend: &'a mut B,
    added_input: bool,
    added_outputs: Vec<OutputKind>,
    committed: bool,
}

impl<'a, B: CameraBackend + ?Sized> ConfigurationGuard<'a, B> {
    pub fn begin(backend: &'a mut B) -> Self {
        backend.begin_configuration();
        Self {
            backend,
            added_input: false,
            added_outputs: Vec::new(),
            committed: false,
        }
    }

    /// Detach whatever a previous run left attached
    pub fn clear(&mut self) {
        self.backend.remove_input();
        self.backend.remove_output(OutputKind::Preview);
        self.backend.remove_output(OutputKind::Photo);
    }

    pub fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        self.backend.add_input(device)?;
        self.added_input = true;
        Ok(())
    }

    pub fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        self.backend.add_output(output)?;
        self.added_outputs.push(output);
        Ok(())
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.backend.set_preset(preset);
    }

    pub fn commit(mut self) -> BackendResult<()> {
        self.backend.commit_configuration()?;
        self.committed = true;
        Ok(())
    }
}

impl<B: CameraBackend + ?Sized> Drop for ConfigurationGuard<'_, B> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        debug!(
            input = self.added_input,
            outputs = ?self.added_outputs,
            "Rolling back session configuration"
        );
        for output in self.added_outputs.drain(..) {
            self.backend.remove_output(output);
        }
        if self.added_input {
            self.backend.remove_input();
        }
        if let Err(e) = self.backend.commit_configuration() {
            warn!(error = %e, "Failed to close configuration bracket after rollback");
        }
    }
}
