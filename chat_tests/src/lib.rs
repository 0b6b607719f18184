//! Shared support for the integration tests: client spawning and scripted
//! peer helpers.

pub mod support {
    use std::net::SocketAddr;

    use anyhow::Context;
    use chat_client::RunSummary;
    use chat_shared::config::{ClientConfig, TransportKind};
    use chat_shared::datagram;
    use chat_shared::msg::Message;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpStream, UdpSocket};
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinHandle;

    /// A client running in a background task.
    pub struct ClientHandle {
        pub input: mpsc::Sender<String>,
        pub stop: watch::Sender<bool>,
        pub done: JoinHandle<anyhow::Result<RunSummary>>,
    }

    /// Config pointing at a test server, with a short confirmation timeout
    /// so retransmission tests stay fast.
    pub fn config_for(addr: SocketAddr, transport: TransportKind) -> ClientConfig {
        let mut cfg = ClientConfig::new(transport, addr.ip().to_string());
        cfg.port = addr.port();
        cfg.confirm_timeout_ms = 150;
        cfg
    }

    /// Spawns the real transport runner against `cfg`.
    pub fn spawn_client(cfg: ClientConfig) -> ClientHandle {
        let (input, input_rx) = mpsc::channel(8);
        let (stop, stop_rx) = watch::channel(false);
        let done = tokio::spawn(async move {
            match cfg.transport {
                TransportKind::Tcp => chat_client::tcp::run(&cfg, input_rx, stop_rx).await,
                TransportKind::Udp => chat_client::udp::run(&cfg, input_rx, stop_rx).await,
            }
        });
        ClientHandle { input, stop, done }
    }

    /// Reads one CRLF-terminated line from a stream peer.
    pub async fn read_line(stream: &mut TcpStream) -> anyhow::Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte).await.context("read")?;
            if n == 0 {
                anyhow::bail!("peer closed while reading a line");
            }
            line.push(byte[0]);
            if line.ends_with(b"\r\n") {
                line.truncate(line.len() - 2);
                return Ok(String::from_utf8(line).context("line is not utf-8")?);
            }
        }
    }

    /// True when the peer has closed the stream without further data.
    pub async fn at_eof(stream: &mut TcpStream) -> anyhow::Result<bool> {
        let mut byte = [0u8; 1];
        Ok(stream.read(&mut byte).await.context("read")? == 0)
    }

    /// Receives and decodes one datagram.
    pub async fn recv_msg(socket: &UdpSocket) -> anyhow::Result<(u16, Message, SocketAddr)> {
        let mut buf = vec![0u8; 64 * 1024];
        let (n, from) = socket.recv_from(&mut buf).await.context("recv_from")?;
        let (msg_id, msg) = datagram::decode(&buf[..n]).context("decode datagram")?;
        Ok((msg_id, msg, from))
    }

    /// Receives one raw datagram for byte-level assertions.
    pub async fn recv_raw(socket: &UdpSocket) -> anyhow::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; 64 * 1024];
        let (n, from) = socket.recv_from(&mut buf).await.context("recv_from")?;
        buf.truncate(n);
        Ok((buf, from))
    }

    /// Sends `msg` stamped with `msg_id` to `to`.
    pub async fn send_msg(
        socket: &UdpSocket,
        to: SocketAddr,
        msg_id: u16,
        msg: &Message,
    ) -> anyhow::Result<()> {
        socket
            .send_to(&datagram::encode(msg_id, msg), to)
            .await
            .context("send_to")?;
        Ok(())
    }

    /// Confirms the datagram with identifier `ref_id`.
    pub async fn send_confirm(
        socket: &UdpSocket,
        to: SocketAddr,
        ref_id: u16,
    ) -> anyhow::Result<()> {
        send_msg(socket, to, 0, &Message::Confirm { ref_id }).await
    }
}
