//! Domain entities: tours, users, reviews, bookings

mod booking;
mod review;
mod tour;
mod user;

pub use booking::{Booking, CreateBooking, UpdateBooking};
pub use review::{tour_scope, CreateReview, RatingsHook, Review, UpdateReview};
pub use tour::{
    slugify, CreateTour, Difficulty, GeoPoint, SlugHook, Tour, TourStop, UpdateTour,
};
pub use user::{CreateUser, PasswordHook, Role, UpdateUser, User, UserResponse};
