//! Native event records and their translation into managed events.
//!
//! [`RawEvent`] mirrors the engine's `#[repr(C)]` event layout. Decoding reads
//! the union member selected by the event type and produces a [`NativeEvent`],
//! which translation pairs with the registry's class and constructor
//! descriptors.

use std::fmt;

use serde::Serialize;

use crate::error::TranslateError;
use crate::registry::{DescriptorKey, DescriptorTable};
use crate::runtime::ManagedEvent;

/// Event type codes as numbered by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum EventType {
    HookEnabled = 1,
    HookDisabled = 2,
    KeyTyped = 3,
    KeyPressed = 4,
    KeyReleased = 5,
    MouseClicked = 6,
    MousePressed = 7,
    MouseReleased = 8,
    MouseMoved = 9,
    MouseDragged = 10,
    MouseWheel = 11,
}

impl EventType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for EventType {
    type Error = TranslateError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::HookEnabled,
            2 => Self::HookDisabled,
            3 => Self::KeyTyped,
            4 => Self::KeyPressed,
            5 => Self::KeyReleased,
            6 => Self::MouseClicked,
            7 => Self::MousePressed,
            8 => Self::MouseReleased,
            9 => Self::MouseMoved,
            10 => Self::MouseDragged,
            11 => Self::MouseWheel,
            other => return Err(TranslateError::UnknownType(other)),
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardData {
    pub keycode: u16,
    pub rawcode: u16,
    pub keychar: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseData {
    pub button: u16,
    pub clicks: u16,
    pub x: i16,
    pub y: i16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelData {
    pub clicks: u16,
    pub x: i16,
    pub y: i16,
    pub kind: u8,
    pub amount: u16,
    pub rotation: i16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union RawEventData {
    pub keyboard: KeyboardData,
    pub mouse: MouseData,
    pub wheel: WheelData,
}

impl RawEventData {
    fn zeroed() -> Self {
        Self {
            wheel: WheelData::default(),
        }
    }
}

/// Event record as handed over by the engine's dispatch thread.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawEvent {
    pub kind: u32,
    /// Milliseconds since the epoch.
    pub time: u64,
    /// Modifier mask.
    pub mask: u16,
    pub reserved: u16,
    pub data: RawEventData,
}

impl RawEvent {
    pub fn hook(kind: EventType, time: u64) -> Self {
        Self {
            kind: kind.code(),
            time,
            mask: 0,
            reserved: 0,
            data: RawEventData::zeroed(),
        }
    }

    pub fn keyboard(kind: EventType, time: u64, mask: u16, keyboard: KeyboardData) -> Self {
        let mut event = Self::hook(kind, time);
        event.mask = mask;
        event.data.keyboard = keyboard;
        event
    }

    pub fn mouse(kind: EventType, time: u64, mask: u16, mouse: MouseData) -> Self {
        let mut event = Self::hook(kind, time);
        event.mask = mask;
        event.data.mouse = mouse;
        event
    }

    pub fn wheel(time: u64, mask: u16, wheel: WheelData) -> Self {
        let mut event = Self::hook(EventType::MouseWheel, time);
        event.mask = mask;
        event.data.wheel = wheel;
        event
    }

    /// Decode the record. Only the union member matching the type code is read.
    pub fn decode(&self) -> Result<NativeEvent, TranslateError> {
        let kind = EventType::try_from(self.kind)?;
        let when = self.time;
        let modifiers = self.mask;
        // SAFETY: every union member is plain integers, and the engine writes
        // the member that corresponds to `kind`.
        let event = unsafe {
            match kind {
                EventType::HookEnabled | EventType::HookDisabled => NativeEvent::Hook { kind, when },
                EventType::KeyTyped | EventType::KeyPressed | EventType::KeyReleased => {
                    let data = self.data.keyboard;
                    NativeEvent::Key(KeyEvent {
                        kind,
                        when,
                        modifiers,
                        keycode: data.keycode,
                        rawcode: data.rawcode,
                        keychar: data.keychar,
                    })
                }
                EventType::MouseClicked
                | EventType::MousePressed
                | EventType::MouseReleased
                | EventType::MouseMoved
                | EventType::MouseDragged => {
                    let data = self.data.mouse;
                    NativeEvent::Mouse(MouseEvent {
                        kind,
                        when,
                        modifiers,
                        button: data.button,
                        clicks: data.clicks,
                        x: data.x,
                        y: data.y,
                    })
                }
                EventType::MouseWheel => {
                    let data = self.data.wheel;
                    NativeEvent::Wheel(WheelEvent {
                        when,
                        modifiers,
                        clicks: data.clicks,
                        x: data.x,
                        y: data.y,
                        scroll_type: data.kind,
                        amount: data.amount,
                        rotation: data.rotation,
                    })
                }
            }
        };
        Ok(event)
    }
}

impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("kind", &self.kind)
            .field("time", &self.time)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    pub kind: EventType,
    pub when: u64,
    pub modifiers: u16,
    pub keycode: u16,
    pub rawcode: u16,
    pub keychar: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MouseEvent {
    pub kind: EventType,
    pub when: u64,
    pub modifiers: u16,
    pub button: u16,
    pub clicks: u16,
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WheelEvent {
    pub when: u64,
    pub modifiers: u16,
    pub clicks: u16,
    pub x: i16,
    pub y: i16,
    pub scroll_type: u8,
    pub amount: u16,
    pub rotation: i16,
}

/// Decoded native event.
///
/// Serialized with `#[serde(tag = "type", content = "data")]` for log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NativeEvent {
    /// Engine start/stop notifications. Never dispatched to the runtime.
    Hook { kind: EventType, when: u64 },
    Key(KeyEvent),
    Mouse(MouseEvent),
    Wheel(WheelEvent),
}

impl NativeEvent {
    pub fn kind(&self) -> EventType {
        match self {
            Self::Hook { kind, .. } => *kind,
            Self::Key(e) => e.kind,
            Self::Mouse(e) => e.kind,
            Self::Wheel(_) => EventType::MouseWheel,
        }
    }
}

/// Pair a raw record with the descriptors needed to build it in the runtime.
///
/// Returns `Ok(None)` for events that are not delivered (hook lifecycle).
pub fn translate(
    raw: &RawEvent,
    table: &DescriptorTable,
) -> Result<Option<ManagedEvent>, TranslateError> {
    let event = raw.decode()?;
    let (class, constructor) = match &event {
        NativeEvent::Hook { kind, .. } => {
            tracing::debug!(?kind, "hook lifecycle event, not dispatched");
            return Ok(None);
        }
        NativeEvent::Key(_) => (DescriptorKey::KeyEventClass, DescriptorKey::KeyEventConstructor),
        NativeEvent::Mouse(_) => (DescriptorKey::MouseEventClass, DescriptorKey::MouseEventConstructor),
        NativeEvent::Wheel(_) => (
            DescriptorKey::MouseWheelEventClass,
            DescriptorKey::MouseWheelEventConstructor,
        ),
    };
    Ok(Some(ManagedEvent {
        class: table.get(class),
        constructor: table.get(constructor),
        event,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_codes() {
        assert_eq!(EventType::try_from(7), Ok(EventType::MousePressed));
        assert_eq!(EventType::MouseWheel.code(), 11);
        assert_eq!(EventType::try_from(0), Err(TranslateError::UnknownType(0)));
        assert_eq!(EventType::try_from(12), Err(TranslateError::UnknownType(12)));
    }

    #[test]
    fn test_decode_button_press() {
        let raw = RawEvent::mouse(
            EventType::MousePressed,
            1_700_000_000_000,
            0x10,
            MouseData { button: 1, clicks: 1, x: 10, y: 20 },
        );
        let NativeEvent::Mouse(event) = raw.decode().unwrap() else {
            panic!("expected a mouse event");
        };
        assert_eq!(event.kind, EventType::MousePressed);
        assert_eq!(event.button, 1);
        assert_eq!((event.x, event.y), (10, 20));
        assert_eq!(event.modifiers, 0x10);
        assert_eq!(event.when, 1_700_000_000_000);
    }

    #[test]
    fn test_decode_key_and_wheel() {
        let key = RawEvent::keyboard(
            EventType::KeyTyped,
            5,
            0,
            KeyboardData { keycode: 0, rawcode: 0x41, keychar: 'a' as u16 },
        );
        assert!(matches!(key.decode().unwrap(), NativeEvent::Key(KeyEvent { keychar: 97, .. })));

        let wheel = RawEvent::wheel(
            6,
            0,
            WheelData { clicks: 1, x: -3, y: 4, kind: 1, amount: 3, rotation: -1 },
        );
        let NativeEvent::Wheel(event) = wheel.decode().unwrap() else {
            panic!("expected a wheel event");
        };
        assert_eq!(event.rotation, -1);
        assert_eq!(event.x, -3);
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut raw = RawEvent::hook(EventType::HookEnabled, 0);
        raw.kind = 99;
        assert_eq!(raw.decode(), Err(TranslateError::UnknownType(99)));
    }

    #[test]
    fn test_event_serialization() {
        let raw = RawEvent::mouse(
            EventType::MouseMoved,
            1,
            0,
            MouseData { button: 0, clicks: 0, x: 7, y: 8 },
        );
        let json = serde_json::to_string(&raw.decode().unwrap()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "mouse");
        assert_eq!(parsed["data"]["kind"], "mouse_moved");
        assert_eq!(parsed["data"]["x"], 7);
    }
}
