pub mod enroll;
