//! russh-backed channel binding.
//!
//! Wraps a channel of an already-authenticated russh session. The channel
//! object must serve reads and writes concurrently, so after [`subscribe`]
//! it moves into a pump task: inbound `ChannelMsg`s become [`ChannelEvent`]s
//! and outbound sends arrive over a command queue, acknowledged through a
//! oneshot so failures reach the caller of the triggering flush.
//!
//! [`subscribe`]: crate::transport::ChannelSession::subscribe

use bytes::Bytes;
use log::debug;
use russh::client::{Handle, Handler, Msg};
use russh::{Channel, ChannelMsg, Pty};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use super::ChannelEvent;
use crate::channel::{TerminalConfig, TerminalMode};
use crate::error::{ChannelError, Result, TransportError};

/// Outbound requests handled by the pump task.
enum Command {
    Send(Vec<u8>, oneshot::Sender<Result<()>>),
    Close,
}

/// `ChannelSession` implementation over a russh session channel.
pub struct RusshChannel<H: Handler> {
    /// Handle of the authenticated russh session.
    handle: Handle<H>,

    /// The open channel, until the pump task takes it over.
    channel: Option<Channel<Msg>>,

    /// Command queue into the pump task, once running.
    commands: Option<UnboundedSender<Command>>,
}

impl<H: Handler> RusshChannel<H> {
    /// Create a binding over an authenticated session handle.
    pub fn new(handle: Handle<H>) -> Self {
        Self {
            handle,
            channel: None,
            commands: None,
        }
    }
}

impl<H: Handler> super::ChannelSession for RusshChannel<H> {
    async fn open(&mut self) -> Result<()> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        self.channel = Some(channel);
        Ok(())
    }

    async fn request_pty(&mut self, config: &TerminalConfig) -> Result<bool> {
        let channel = self.channel.as_ref().ok_or(ChannelError::NotOpen)?;

        let modes: Vec<(Pty, u32)> = config
            .modes
            .iter()
            .map(|(mode, value)| (pty_opcode(*mode), *value))
            .collect();

        channel
            .request_pty(
                true,
                &config.term,
                config.width_columns,
                config.height_rows,
                config.width_pixels,
                config.height_pixels,
                &modes,
            )
            .await
            .map_err(TransportError::Ssh)?;

        Ok(true)
    }

    async fn request_shell(&mut self) -> Result<bool> {
        let channel = self.channel.as_ref().ok_or(ChannelError::NotOpen)?;
        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;
        Ok(true)
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if let Some(commands) = &self.commands {
            let (ack, outcome) = oneshot::channel();
            commands
                .send(Command::Send(data.to_vec(), ack))
                .map_err(|_| TransportError::Disconnected)?;
            outcome.await.map_err(|_| TransportError::Disconnected)?
        } else {
            let channel = self.channel.as_ref().ok_or(ChannelError::NotOpen)?;
            channel.data(data).await.map_err(TransportError::Ssh)?;
            Ok(())
        }
    }

    fn subscribe(&mut self) -> UnboundedReceiver<ChannelEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        if let Some(channel) = self.channel.take() {
            let (command_tx, command_rx) = mpsc::unbounded_channel();
            self.commands = Some(command_tx);
            tokio::spawn(run_channel(channel, command_rx, event_tx));
        }
        event_rx
    }

    async fn dispose(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close);
        } else if let Some(channel) = self.channel.take() {
            let _ = channel.close().await;
        }
    }
}

/// Pump loop owning the channel: translates inbound messages into events
/// and serializes outbound sends.
async fn run_channel(
    mut channel: Channel<Msg>,
    mut commands: UnboundedReceiver<Command>,
    events: UnboundedSender<ChannelEvent>,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    let _ = events.send(ChannelEvent::Data(Bytes::copy_from_slice(&data)));
                }
                // A PTY merges the streams, but forward stderr just in case.
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    let _ = events.send(ChannelEvent::Data(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::Eof) => {}
                Some(ChannelMsg::Close) | None => {
                    debug!("channel closed by peer");
                    let _ = events.send(ChannelEvent::Closed);
                    break;
                }
                Some(_) => {}
            },
            command = commands.recv() => match command {
                Some(Command::Send(data, ack)) => {
                    let outcome = channel
                        .data(&data[..])
                        .await
                        .map_err(|e| TransportError::Ssh(e).into());
                    let _ = ack.send(outcome);
                }
                Some(Command::Close) | None => {
                    let _ = channel.close().await;
                    let _ = events.send(ChannelEvent::Closed);
                    break;
                }
            },
        }
    }
}

/// Map an RFC 4254 opcode to russh's `Pty` encoding.
fn pty_opcode(mode: TerminalMode) -> Pty {
    match mode {
        TerminalMode::VIntr => Pty::VINTR,
        TerminalMode::VQuit => Pty::VQUIT,
        TerminalMode::VErase => Pty::VERASE,
        TerminalMode::VKill => Pty::VKILL,
        TerminalMode::VEof => Pty::VEOF,
        TerminalMode::VStart => Pty::VSTART,
        TerminalMode::VStop => Pty::VSTOP,
        TerminalMode::IgnCr => Pty::IGNCR,
        TerminalMode::ICrNl => Pty::ICRNL,
        TerminalMode::IXon => Pty::IXON,
        TerminalMode::IXoff => Pty::IXOFF,
        TerminalMode::ISig => Pty::ISIG,
        TerminalMode::ICanon => Pty::ICANON,
        TerminalMode::Echo => Pty::ECHO,
        TerminalMode::EchoE => Pty::ECHOE,
        TerminalMode::EchoK => Pty::ECHOK,
        TerminalMode::EchoNl => Pty::ECHONL,
        TerminalMode::NoFlsh => Pty::NOFLSH,
        TerminalMode::OPost => Pty::OPOST,
        TerminalMode::OnlCr => Pty::ONLCR,
        TerminalMode::Cs8 => Pty::CS8,
        TerminalMode::ParEnb => Pty::PARENB,
        TerminalMode::TtyOpIspeed => Pty::TTY_OP_ISPEED,
        TerminalMode::TtyOpOspeed => Pty::TTY_OP_OSPEED,
    }
}
