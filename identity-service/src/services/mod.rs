//! Services layer for identity-service.
//!
//! Error type, time and randomness sources, and the persistence seams.

mod clock;
pub mod error;
mod memory;
mod random;
pub mod repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::IdentityError;
pub use memory::InMemoryIdentityStore;
pub use random::RandomBlobGenerator;
pub use repository::{
    ChallengeRepository, GrantRepository, ServiceApplicationRepository, UnitOfWork,
    UnitOfWorkFactory, UserRepository,
};
