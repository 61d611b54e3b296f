// Tracked kinds exposed across the boundary

use super::TrackedKind;
use crate::connection::{Connection, ConnectionEventArgs, ConnectionMessageEventArgs};
use crate::message::ConnectionMessage;
use crate::properties::NamedProperties;
use crate::recognizer::Recognizer;

pub struct RecognizerKind;

impl TrackedKind for RecognizerKind {
    type Object = dyn Recognizer;
    const NAME: &'static str = "recognizer";
    const TAG: u16 = 0x0101;
}

pub struct ConnectionKind;

impl TrackedKind for ConnectionKind {
    type Object = dyn Connection;
    const NAME: &'static str = "connection";
    const TAG: u16 = 0x0102;
}

/// Connected/Disconnected event arguments.
pub struct ConnectionEventKind;

impl TrackedKind for ConnectionEventKind {
    type Object = ConnectionEventArgs;
    const NAME: &'static str = "connection event";
    const TAG: u16 = 0x0103;
}

pub struct ConnectionMessageEventKind;

impl TrackedKind for ConnectionMessageEventKind {
    type Object = ConnectionMessageEventArgs;
    const NAME: &'static str = "connection message event";
    const TAG: u16 = 0x0104;
}

pub struct ConnectionMessageKind;

impl TrackedKind for ConnectionMessageKind {
    type Object = dyn ConnectionMessage;
    const NAME: &'static str = "connection message";
    const TAG: u16 = 0x0105;
}

pub struct PropertyBagKind;

impl TrackedKind for PropertyBagKind {
    type Object = dyn NamedProperties;
    const NAME: &'static str = "property bag";
    const TAG: u16 = 0x0106;
}
