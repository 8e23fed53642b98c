//! A flash target backed by a shared [`DummyFlash`]
//!
//! The flash is shared through `Rc<RefCell<_>>` so a test can inspect or
//! sabotage it while a session owns the target.

use crate::DummyFlash;
use fwflash_core::flash::{self, FlashGeometry};
use fwflash_core::{InstallReport, ResolvedArtifact, Target, VerifyOutcome, Workspace};
use std::cell::RefCell;
use std::rc::Rc;

/// Raw flash target writing into an in-memory flash
pub struct DummyTarget {
    name: String,
    flash: Rc<RefCell<DummyFlash>>,
    geometry: FlashGeometry,
}

impl DummyTarget {
    /// Create a target named `name` that installs into `flash`
    pub fn new(
        name: impl Into<String>,
        flash: Rc<RefCell<DummyFlash>>,
        geometry: FlashGeometry,
    ) -> Self {
        Self {
            name: name.into(),
            flash,
            geometry,
        }
    }

    fn image(&self, artifact: &ResolvedArtifact) -> fwflash_core::Result<Vec<u8>> {
        std::fs::read(artifact.path()).map_err(|e| fwflash_core::Error::io(artifact.path(), e))
    }
}

impl Target for DummyTarget {
    fn verify(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<VerifyOutcome> {
        let image = self.image(artifact)?;
        flash::verify_image(&mut *self.flash.borrow_mut(), &image)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }

    fn install(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<InstallReport> {
        let image = self.image(artifact)?;
        flash::install_image(&mut *self.flash.borrow_mut(), &image, &self.geometry)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }
}
