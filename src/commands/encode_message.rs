// src/commands/encode_message.rs

//! `encode-message`: print a service message for script authors

use conveyor::service_message::ServiceMessage;

/// Print one service message in wire form
pub fn cmd_encode_message(name: &str, attributes: &[(String, String)]) {
    let message = attributes
        .iter()
        .fold(ServiceMessage::new(name), |message, (key, value)| message.with_property(key, value));
    println!("{}", message);
}
