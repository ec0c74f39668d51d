//! Integration tests for the source environment

// Definitions, data statements and the functions they produce
mod environment;
