//! Engine tests with scripted collaborators.

mod query;
mod support;
