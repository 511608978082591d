//! Identifier types for bridge communication.
//!
//! Two integers travel in opposite directions and must never be confused:
//! the serial of an outgoing call (ours) and the command id of an accepted
//! read request (the service's).

use std::fmt;

/// Command id assigned by the remote speech service to one accepted read.
///
/// Wraps the `int32` carried by the ReadCommand reply and by the
/// ReadingStopped/ReadingCancelled signals. Ids are issued remotely and
/// never generated on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(i32);

impl CommandId {
    /// Create a new CommandId from the wire value.
    #[inline]
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the underlying wire value.
    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<i32> for CommandId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<CommandId> for i32 {
    fn from(id: CommandId) -> Self {
        id.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serial number of an outgoing method call on the bus.
///
/// Replies name the call they answer by this serial, which is what routes a
/// ReadCommand reply back to the request that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSerial(u32);

impl CallSerial {
    #[inline]
    pub fn new(serial: u32) -> Self {
        Self(serial)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CallSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn command_id_round_trips_wire_value() {
        let id: CommandId = 42.into();
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
    }

    #[test]
    fn command_id_accepts_negative_wire_values() {
        assert_eq!(CommandId::new(-1).as_i32(), -1);
    }

    #[test]
    fn command_id_hash() {
        let mut map: HashMap<CommandId, &str> = HashMap::new();
        map.insert(CommandId::new(10), "widget-a");
        map.insert(CommandId::new(11), "widget-b");

        assert_eq!(map.get(&CommandId::new(10)), Some(&"widget-a"));
        assert_eq!(map.get(&CommandId::new(11)), Some(&"widget-b"));
        assert_eq!(map.get(&CommandId::new(12)), None);
    }

    #[test]
    fn display_distinguishes_serials_from_command_ids() {
        assert_eq!(CommandId::new(7).to_string(), "7");
        assert_eq!(CallSerial::new(7).to_string(), "#7");
    }
}
