pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod seeder;
