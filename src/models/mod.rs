pub mod appointment;
pub mod comment;
pub mod doctor;
pub mod payment;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus, AppointmentView};
pub use comment::Comment;
pub use doctor::Doctor;
pub use payment::Payment;
pub use user::{NewUser, User, DEFAULT_PROFILE_PICTURE};
