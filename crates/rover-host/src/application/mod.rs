//! Application layer: what the host does with the messages.
//!
//! The pipelines in `rover_core` only move messages between the socket and
//! the queues.  Code here sits on the other side of those queues: it reads
//! sensor messages and decides which commands to send.
//!
//! - **`mock_controller`** – A scripted controller that answers each sensor
//!   message with the next command from a fixed list.
//! - **`session`** – Starts the inbound, outbound and controller threads for
//!   one connection and stops them in an order that cannot deadlock.

pub mod mock_controller;
pub mod session;
