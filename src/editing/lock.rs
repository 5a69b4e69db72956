use crate::errors::ValidationError;
use crate::models::Parcel;
use crate::registry::{ParcelRegistry, ParcelStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    ParcelSelected,
    Locked,
    Previewing,
    Committing,
}

impl EditState {
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            EditState::Locked | EditState::Previewing | EditState::Committing
        )
    }
}

/// Holds the one parcel a subdivision works on. Once locked, clicks on other
/// parcels are ignored until the lock is released.
#[derive(Clone, Debug, Default)]
pub struct ParcelLockController {
    state: EditState,
    parcel: Option<Parcel>,
}

impl ParcelLockController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn parcel(&self) -> Option<&Parcel> {
        self.parcel.as_ref()
    }

    pub fn locked_parcel(&self) -> Option<&Parcel> {
        self.parcel.as_ref().filter(|_| self.state.is_locked())
    }

    /// Makes `parcel` the candidate. Returns false, and changes nothing,
    /// while a parcel is locked.
    pub fn select_parcel<R: ParcelRegistry>(&mut self, parcel: Parcel, registry: &R) -> bool {
        if self.state.is_locked() {
            tracing::debug!("ignoring selection of {} while locked", parcel.identifier);
            return false;
        }

        registry.reset_styles();
        registry.set_style(&parcel.identifier, ParcelStyle::Candidate);

        self.parcel = Some(parcel);
        self.state = EditState::ParcelSelected;
        true
    }

    pub fn lock(&mut self) -> Result<&Parcel, ValidationError> {
        match (self.state, &self.parcel) {
            (EditState::ParcelSelected, Some(parcel)) => {
                tracing::info!("locked parcel {}", parcel.identifier);
                self.state = EditState::Locked;
                Ok(parcel)
            }
            (state, Some(parcel)) if state.is_locked() => Ok(parcel),
            _ => Err(ValidationError::NoParcelSelected),
        }
    }

    /// Back to idle from any state. Safe to call repeatedly.
    pub fn unlock<R: ParcelRegistry>(&mut self, registry: &R) -> Option<Parcel> {
        let released = self.parcel.take();
        if let Some(parcel) = &released {
            registry.set_style(&parcel.identifier, ParcelStyle::Default);
            tracing::info!("released parcel {}", parcel.identifier);
        }
        self.state = EditState::Idle;
        released
    }

    pub(crate) fn transition(&mut self, to: EditState) {
        self.state = to;
    }
}
