use std::net::SocketAddr;
use std::sync::Arc;

use ferrule_ftp_server::auth::{User, UserStore};
use ferrule_ftp_server::{Server, ServerConfig};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const PASSWORD: &str = "s3cret";

struct TestServer {
    addr: SocketAddr,
    home: TempDir,
}

// Helper to find a short run of ports that are free right now
async fn free_port_range(len: u16) -> (u16, u16) {
    loop {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let start = probe.local_addr().unwrap().port();
        drop(probe);
        if let Some(end) = start.checked_add(len - 1) {
            return (start, end);
        }
    }
}

// Start a server on an ephemeral port with a single user "alice"
async fn start_test_server(max_clients: usize) -> TestServer {
    let home = tempfile::tempdir().unwrap();
    let (pasv_port_min, pasv_port_max) = free_port_range(32).await;

    let config = ServerConfig {
        bind_address: "127.0.0.1".into(),
        control_port: 0,
        pasv_address: "127.0.0.1".into(),
        pasv_port_min,
        pasv_port_max,
        max_clients,
        data_timeout_secs: 5,
        ..ServerConfig::default()
    };
    let store = UserStore::from_users([User {
        username: "alice".into(),
        password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        home: home.path().to_path_buf(),
    }]);

    let server = Server::bind(config, Arc::new(store)).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    TestServer { addr, home }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };
        let greeting = client.read_reply().await;
        (client, greeting)
    }

    // Reads one complete reply, following multi-line continuations
    async fn read_reply(&mut self) -> String {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.unwrap();
            assert!(n > 0, "control connection closed mid-reply: {:?}", reply);
            reply.push_str(&line);
            let bytes = line.as_bytes();
            if bytes.len() >= 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b' ' {
                return reply;
            }
        }
    }

    async fn send_command(&mut self, command: &str) -> String {
        self.writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
        self.read_reply().await
    }

    async fn login(&mut self) {
        assert!(self.send_command("USER alice").await.starts_with("331 "));
        let reply = self.send_command(&format!("PASS {}", PASSWORD)).await;
        assert!(reply.starts_with("230 "), "{}", reply);
    }

    /// Issues PASV and connects to the advertised address.
    async fn passive_data(&mut self) -> TcpStream {
        let reply = self.send_command("PASV").await;
        assert!(reply.starts_with("227 "), "{}", reply);
        let port = parse_pasv_port(&reply);
        TcpStream::connect(("127.0.0.1", port)).await.unwrap()
    }
}

fn parse_pasv_port(reply: &str) -> u16 {
    let start = reply.find('(').unwrap() + 1;
    let end = reply.find(')').unwrap();
    let fields: Vec<u16> = reply[start..end]
        .split(',')
        .map(|f| f.parse().unwrap())
        .collect();
    assert_eq!(fields.len(), 6);
    fields[4] * 256 + fields[5]
}

async fn read_all(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    stream.read_to_end(&mut data).await.unwrap();
    data
}

#[tokio::test]
async fn test_directory_session() {
    let server = start_test_server(8).await;
    let (mut client, greeting) = Client::connect(server.addr).await;
    assert_eq!(greeting, "220 Service ready.\r\n");

    client.login().await;
    assert_eq!(
        client.send_command("PWD").await,
        "257 \"/\" is current directory.\r\n"
    );
    assert_eq!(
        client.send_command("MKD reports").await,
        "257 \"/reports\" directory created.\r\n"
    );
    assert!(server.home.path().join("reports").is_dir());
    assert_eq!(
        client.send_command("CWD reports").await,
        "250 Directory successfully changed.\r\n"
    );
    assert_eq!(
        client.send_command("PWD").await,
        "257 \"/reports\" is current directory.\r\n"
    );
    assert!(client.send_command("CDUP").await.starts_with("200 "));
    assert_eq!(
        client.send_command("PWD").await,
        "257 \"/\" is current directory.\r\n"
    );
    assert!(client.send_command("RMD reports").await.starts_with("250 "));
    assert!(!server.home.path().join("reports").exists());
    assert_eq!(client.send_command("QUIT").await, "221 Goodbye.\r\n");

    let mut rest = String::new();
    client.reader.read_to_string(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_unauthenticated_commands_are_refused() {
    let server = start_test_server(8).await;
    let (mut client, _) = Client::connect(server.addr).await;

    for command in ["PWD", "MKD nope", "PASV", "PORT 127,0,0,1,4,1", "LIST"] {
        assert_eq!(
            client.send_command(command).await,
            "530 Not logged in.\r\n",
            "{}",
            command
        );
    }
    assert!(!server.home.path().join("nope").exists());
    assert_eq!(
        client.send_command("PASS whatever").await,
        "503 Bad sequence of commands.\r\n"
    );
}

#[tokio::test]
async fn test_passive_listing() {
    let server = start_test_server(8).await;
    std::fs::write(server.home.path().join("b.txt"), b"hello").unwrap();
    std::fs::create_dir(server.home.path().join("a-dir")).unwrap();

    let (mut client, _) = Client::connect(server.addr).await;
    client.login().await;

    let data = client.passive_data().await;
    assert!(client.send_command("NLST").await.starts_with("150 "));
    let names = read_all(data).await;
    assert_eq!(String::from_utf8(names).unwrap(), "a-dir\r\nb.txt\r\n");
    assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");

    let data = client.passive_data().await;
    assert!(client.send_command("LIST -la").await.starts_with("150 "));
    let listing = String::from_utf8(read_all(data).await).unwrap();
    let lines: Vec<&str> = listing.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('d') && lines[0].ends_with(" a-dir"));
    assert!(lines[1].starts_with('-') && lines[1].ends_with(" b.txt"));
    assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");

    // The listener was consumed by the transfer
    assert_eq!(
        client.send_command("LIST").await,
        "425 Use PORT or PASV first.\r\n"
    );
}

#[tokio::test]
async fn test_active_download() {
    let server = start_test_server(8).await;
    let body: Vec<u8> = (0..100_000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(server.home.path().join("data.bin"), &body).unwrap();

    let (mut client, _) = Client::connect(server.addr).await;
    client.login().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let port_command = format!("PORT 127,0,0,1,{},{}", port / 256, port % 256);
    assert_eq!(
        client.send_command(&port_command).await,
        "200 PORT command successful.\r\n"
    );

    assert!(client.send_command("RETR data.bin").await.starts_with("150 "));
    let (data, _) = listener.accept().await.unwrap();
    assert_eq!(read_all(data).await, body);
    assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");
}

#[tokio::test]
async fn test_passive_upload_refuses_overwrite() {
    let server = start_test_server(8).await;
    let (mut client, _) = Client::connect(server.addr).await;
    client.login().await;

    let mut data = client.passive_data().await;
    assert!(client.send_command("STOR upload.txt").await.starts_with("150 "));
    data.write_all(b"uploaded contents").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");
    assert_eq!(
        std::fs::read(server.home.path().join("upload.txt")).unwrap(),
        b"uploaded contents"
    );

    let _data = client.passive_data().await;
    assert_eq!(
        client.send_command("STOR upload.txt").await,
        "550 File already exists.\r\n"
    );
}

#[tokio::test]
async fn test_unique_upload_never_collides() {
    let server = start_test_server(8).await;
    std::fs::create_dir(server.home.path().join("inbox")).unwrap();
    let (mut client, _) = Client::connect(server.addr).await;
    client.login().await;
    assert!(client.send_command("CWD inbox").await.starts_with("250 "));

    let mut names = Vec::new();
    for body in [&b"first"[..], &b"second"[..]] {
        let mut data = client.passive_data().await;
        let reply = client.send_command("STOU notes.txt").await;
        let name = reply
            .strip_prefix("150 FILE: ")
            .and_then(|rest| rest.strip_suffix("\r\n"))
            .unwrap_or_else(|| panic!("unexpected reply {:?}", reply))
            .to_string();
        data.write_all(body).await.unwrap();
        data.shutdown().await.unwrap();
        drop(data);
        assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");

        assert!(name.starts_with("notes_") && name.ends_with(".txt"), "{}", name);
        assert_eq!(
            std::fs::read(server.home.path().join("inbox").join(&name)).unwrap(),
            body
        );
        names.push(name);
    }
    assert_ne!(names[0], names[1]);

    let data = client.passive_data().await;
    assert!(client.send_command("NLST").await.starts_with("150 "));
    let listing = String::from_utf8(read_all(data).await).unwrap();
    let mut expected = names.clone();
    expected.sort();
    assert_eq!(listing, format!("{}\r\n{}\r\n", expected[0], expected[1]));
    assert_eq!(client.read_reply().await, "226 Transfer complete.\r\n");

    let _data = client.passive_data().await;
    let reply = client.send_command("STOU").await;
    assert!(reply.starts_with("150 FILE: file_"), "{}", reply);
}

#[tokio::test]
async fn test_path_escape_is_clamped_to_home() {
    let server = start_test_server(8).await;
    let (mut client, _) = Client::connect(server.addr).await;
    client.login().await;

    assert!(client.send_command("CWD ../../../etc").await.starts_with("250 "));
    assert_eq!(
        client.send_command("PWD").await,
        "257 \"/\" is current directory.\r\n"
    );

    let _data = client.passive_data().await;
    assert_eq!(
        client.send_command("RETR ../../../etc/passwd").await,
        "550 Not a regular file.\r\n"
    );
}

#[tokio::test]
async fn test_connection_limit() {
    let server = start_test_server(1).await;
    let (mut first, greeting) = Client::connect(server.addr).await;
    assert!(greeting.starts_with("220 "));

    let (_second, rejection) = Client::connect(server.addr).await;
    assert_eq!(rejection, "421 Too many connections. Try again later.\r\n");

    assert_eq!(first.send_command("NOOP").await, "200 NOOP ok.\r\n");
}
