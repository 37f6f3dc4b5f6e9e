//! Identity types held by the client: the signed-in user, their learning profile,
//! and the credential/signup forms with local validation.
//! Keep the public surface thin and split implementation across sub-modules.

mod user;
mod profile;
mod credentials;

pub use user::User;
pub use profile::{HardwareExperience, Profile, SoftwareBackground};
pub use credentials::{Credentials, SignupForm, ValidationError, validate_user_id};
