// SPDX-License-Identifier: GPL-3.0-only

//! Input/output bookkeeping shared by the camera backends
//!
//! A session graph holds at most one device input and at most one output of
//! each kind. Every mutation must happen between `begin` and `commit`.

use super::types::*;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SessionGraph {
    configuring: bool,
    input: Option<CameraDevice>,
    outputs: Vec<OutputKind>,
    preset: SessionPreset,
}

impl SessionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        debug!("Begin session configuration");
        self.configuring = true;
    }

    pub fn commit(&mut self) -> BackendResult<()> {
        if !self.configuring {
            return Err(BackendError::NotConfiguring);
        }
        self.configuring = false;
        debug!(
            input = ?self.input.as_ref().map(|d| d.name.as_str()),
            outputs = ?self.outputs,
            preset = %self.preset,
            "Committed session configuration"
        );
        Ok(())
    }

    pub fn is_configuring(&self) -> bool {
        self.configuring
    }

    pub fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        self.ensure_configuring()?;
        if let Some(existing) = &self.input {
            return Err(BackendError::InitializationFailed(format!(
                "session already has input {}",
                existing.name
            )));
        }
        self.input = Some(device.clone());
        Ok(())
    }

    pub fn remove_input(&mut self) -> Option<CameraDevice> {
        self.input.take()
    }

    pub fn input(&self) -> Option<&CameraDevice> {
        self.input.as_ref()
    }

    pub fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        self.ensure_configuring()?;
        if self.outputs.contains(&output) {
            return Err(BackendError::Other(format!("{:?} output already attached", output)));
        }
        self.outputs.push(output);
        Ok(())
    }

    pub fn remove_output(&mut self, output: OutputKind) {
        self.outputs.retain(|o| *o != output);
    }

    pub fn has_output(&self, output: OutputKind) -> bool {
        self.outputs.contains(&output)
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    fn ensure_configuring(&self) -> BackendResult<()> {
        if self.configuring {
            Ok(())
        } else {
            Err(BackendError::NotConfiguring)
        }
    }
}
