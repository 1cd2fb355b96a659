//! End-to-end tests for Vidhost
//!
//! Run the server on a real socket and talk to it with an HTTP client,
//! covering behavior only visible over a connection such as client
//! disconnects mid-body.

mod streaming_workflow;
