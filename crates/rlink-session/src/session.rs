//! Exclusive command sessions.

use std::time::Duration;

use rlink_bridge_protocol::{
    frequency_registers, BridgeCommand, BridgeError, BridgeResponse, Led, LedMode, RadioPacket,
    Register, RegisterMode, RegisterSetting,
};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::device::BridgeDevice;
use crate::error::{Result, SessionError};
use crate::transport::BridgeTransport;

/// Exclusive use of a bridge for the length of one
/// [`run_session`](BridgeDevice::run_session) body.
///
/// Only one session per device exists at a time, so a reply always belongs
/// to the command this session just sent.
pub struct CommandSession<T: BridgeTransport> {
    device: BridgeDevice<T>,
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl<T: BridgeTransport> CommandSession<T> {
    pub(crate) fn new(device: BridgeDevice<T>, name: &str, guard: OwnedMutexGuard<()>) -> Self {
        CommandSession {
            device,
            name: name.to_string(),
            _guard: guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &BridgeDevice<T> {
        &self.device
    }

    /// Send `command` and wait up to `timeout` for its reply.
    ///
    /// Fails with the bridge's error code (`RxTimeout`, `CmdInterrupted`,
    /// `ZeroData`, ...), with [`SessionError::ResponseTimeout`] if the bridge
    /// stays silent, or with [`BridgeError::CmdInterrupted`] if
    /// [`BridgeDevice::cancel_command`] is called meanwhile.
    pub async fn do_command(
        &mut self,
        command: &BridgeCommand,
        timeout: Duration,
    ) -> Result<BridgeResponse> {
        self.device.inner().command(command, timeout).await
    }

    /// [`do_command`](Self::do_command) with the command's own timeout.
    pub async fn run_command(&mut self, command: &BridgeCommand) -> Result<BridgeResponse> {
        let timeout = command.response_timeout(self.device.inner().config().ble_latency());
        self.do_command(command, timeout).await
    }

    /// Run a listening command and return the packet it heard.
    pub async fn listen(&mut self, command: &BridgeCommand) -> Result<RadioPacket> {
        let response = self.run_command(command).await?;
        Ok(response.into_packet(command.code())?)
    }

    pub async fn get_packet(&mut self, channel: u8, timeout_ms: u32) -> Result<RadioPacket> {
        self.listen(&BridgeCommand::GetPacket {
            channel,
            timeout_ms,
        })
        .await
    }

    pub async fn send_packet(
        &mut self,
        channel: u8,
        repeat_count: u8,
        delay_ms: u8,
        data: Vec<u8>,
    ) -> Result<()> {
        self.run_command(&BridgeCommand::SendPacket {
            channel,
            repeat_count,
            delay_ms,
            data,
        })
        .await?;
        Ok(())
    }

    pub async fn get_state(&mut self) -> Result<()> {
        self.run_command(&BridgeCommand::GetState).await?;
        Ok(())
    }

    /// Read the firmware version string. Accepts both the legacy and the
    /// current reply format, since the version decides which is in use.
    pub async fn read_version(&mut self) -> Result<String> {
        let command = BridgeCommand::GetVersion;
        let timeout = command.response_timeout(self.device.inner().config().ble_latency());
        match self.device.inner().command_with(&command, timeout, true).await? {
            BridgeResponse::Version { version, .. } => Ok(version),
            other => Err(BridgeError::InvalidResponse(vec![other.code().to_byte()]).into()),
        }
    }

    pub async fn update_register(&mut self, register: Register, value: u8) -> Result<()> {
        self.run_command(&BridgeCommand::UpdateRegister { register, value })
            .await?;
        Ok(())
    }

    /// Write each setting in order, stopping at the first failure.
    pub async fn update_registers(&mut self, settings: &[RegisterSetting]) -> Result<()> {
        for setting in settings {
            self.update_register(setting.register, setting.value).await?;
        }
        Ok(())
    }

    pub async fn read_register(&mut self, register: Register) -> Result<u8> {
        let supported = self
            .device
            .firmware()
            .is_some_and(|firmware| firmware.supports_read_register());
        if !supported {
            return Err(SessionError::Unsupported("ReadRegister"));
        }
        match self
            .run_command(&BridgeCommand::ReadRegister { register })
            .await?
        {
            BridgeResponse::Register { value, .. } => Ok(value),
            other => Err(BridgeError::InvalidResponse(vec![other.code().to_byte()]).into()),
        }
    }

    pub async fn set_mode_registers(
        &mut self,
        mode: RegisterMode,
        settings: Vec<RegisterSetting>,
    ) -> Result<()> {
        self.run_command(&BridgeCommand::SetModeRegisters { mode, settings })
            .await?;
        Ok(())
    }

    /// Tune the radio to `mhz`.
    pub async fn set_base_frequency(&mut self, mhz: f64) -> Result<()> {
        debug!(device = self.device.name(), mhz, "Setting base frequency");
        self.update_registers(&frequency_registers(mhz)).await
    }

    pub async fn set_led(&mut self, led: Led, mode: LedMode) -> Result<()> {
        self.run_command(&BridgeCommand::Led { led, mode }).await?;
        Ok(())
    }

    /// Reset the radio. The bridge does not reply.
    pub async fn reset(&mut self) -> Result<()> {
        self.run_command(&BridgeCommand::Reset).await?;
        Ok(())
    }

    /// Hand a packet nobody in this session wanted to packet subscribers.
    pub fn forward_packet(&self, packet: RadioPacket) {
        self.device.inner().publish(packet);
    }
}
