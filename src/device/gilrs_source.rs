use super::{DeviceError, DeviceIndex, DeviceInfo, InputSource};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

// Button numbering follows the common gamepad layout (A, B, X, Y, Back,
// Guide, Start, sticks, shoulders, D-pad), extras appended
const BUTTON_ORDER: [Button; 19] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::Select,
    Button::Mode,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::C,
    Button::Z,
];

const AXIS_ORDER: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

/// gilrs-backed input source.
///
/// Gamepads get a device index the first time they are seen and keep it for
/// the rest of the session, also across disconnects.
pub struct GilrsSource {
    gilrs: Gilrs,
    // position = DeviceIndex
    slots: Vec<GamepadId>,
}

impl GilrsSource {
    pub fn create() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        let slots: Vec<GamepadId> = gilrs.gamepads().map(|(id, _)| id).collect();
        debug!("gilrs reports {} gamepad(s) at startup", slots.len());
        Ok(Self { gilrs, slots })
    }

    fn gamepad(&self, device: DeviceIndex) -> Option<Gamepad<'_>> {
        let id = *self.slots.get(device)?;
        self.gilrs.connected_gamepad(id)
    }

    fn slot_of(&mut self, id: GamepadId) -> DeviceIndex {
        match self.slots.iter().position(|s| *s == id) {
            Some(index) => index,
            None => {
                self.slots.push(id);
                self.slots.len() - 1
            }
        }
    }
}

impl InputSource for GilrsSource {
    fn refresh(&mut self) {
        // gilrs updates its cached gamepad state while events are drained
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    let index = self.slot_of(id);
                    let name = self.gilrs.gamepad(id).name().to_string();
                    info!("Controller connected: [{}] {}", index, name);
                }
                EventType::Disconnected => {
                    let index = self.slot_of(id);
                    warn!("Controller disconnected: [{}]", index);
                }
                other => debug!("gilrs event from {}: {:?}", id, other),
            }
        }
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let gamepad = self.gilrs.gamepad(*id);
                DeviceInfo {
                    index,
                    guid: uuid::Uuid::from_bytes(gamepad.uuid()).simple().to_string(),
                    name: gamepad.name().to_string(),
                    button_count: BUTTON_ORDER.len() as u32,
                    axis_count: AXIS_ORDER.len() as u32,
                    connected: gamepad.is_connected(),
                }
            })
            .collect()
    }

    fn button(&self, device: DeviceIndex, id: u32) -> Option<bool> {
        let button = *BUTTON_ORDER.get(id as usize)?;
        Some(self.gamepad(device)?.is_pressed(button))
    }

    fn axis(&self, device: DeviceIndex, id: u32) -> Option<f32> {
        let axis = *AXIS_ORDER.get(id as usize)?;
        let value = self.gamepad(device)?.value(axis);
        // gilrs reports stick Y up-positive; screen space is down-positive
        let value = match axis {
            Axis::LeftStickY | Axis::RightStickY | Axis::DPadY => -value,
            _ => value,
        };
        Some(value.clamp(-1.0, 1.0))
    }
}
