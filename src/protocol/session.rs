use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::{
    Error, Result,
    binary::{BinaryDeserializer, BinarySerializer},
    block::Block,
    buffer::{BufferedReader, BufferedWriter},
    config::{ClientConfig, SettingValue},
    insert::{ValuesParser, split_insert_query},
};

use super::{
    CLIENT_REVISION, ClientContext, PreparedInsert, QueryResult, Request, Response,
    ServerContext, SharedStream,
};

type Reader = BinaryDeserializer<BufferedReader<SharedStream>>;
type Writer = BinarySerializer<BufferedWriter<SharedStream>>;

/// One handshaken connection to the server.
///
/// A session is a sequential request/response pipeline. It is `Send`, so it
/// can move between threads, but every call needs `&mut self` and nothing
/// inside guards against overlapping use.
pub struct Session {
    config: ClientConfig,
    stream: SharedStream,
    reader: Reader,
    writer: Writer,
    client: ClientContext,
    server: ServerContext,
    compressed: bool,
    interrupted: Arc<AtomicBool>,
    closed: bool,
}

impl Session {
    /// Connects and performs the handshake. No session is returned unless
    /// both succeed.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let compression = config.compression_method()?;
        let stream = SharedStream::connect(&config)?;
        info!(
            "connected to {} (tls: {}, compression: {})",
            config.address(),
            config.ssl,
            compression.map_or("disabled".to_string(), |m| m.to_string())
        );

        let writer = BinarySerializer::with_frame_capacity(
            BufferedWriter::new(stream.clone(), config.send_buffer_size),
            compression,
            config.send_buffer_size,
        );
        let reader = BinaryDeserializer::new(
            BufferedReader::new(stream.clone(), config.receive_buffer_size),
            compression.is_some(),
        )
        .with_checksum_verification(config.verify_checksum);
        let initial_address = stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();

        let mut session = Self {
            client: ClientContext::new(config.client_name.clone(), initial_address),
            config,
            stream,
            reader,
            writer,
            server: ServerContext::default(),
            compressed: compression.is_some(),
            interrupted: Arc::new(AtomicBool::new(false)),
            closed: false,
        };
        if let Err(e) = session.handshake() {
            warn!("handshake with {} failed: {e}", session.config.address());
            session.silent_disconnect();
            return Err(e);
        }
        Ok(session)
    }

    fn handshake(&mut self) -> Result<()> {
        let hello = Request::Hello {
            client_name: &self.config.client_name,
            database: &self.config.database,
            user: &self.config.user,
            password: &self.config.password,
        };
        hello.write(&mut self.writer, CLIENT_REVISION)?;
        self.writer.flush_to_target(true)?;

        match self.receive(self.config.connect_timeout())? {
            Response::Hello(server) => {
                info!(
                    "server {} {} (revision {}, timezone {}, display name {})",
                    server.name,
                    server.version(),
                    server.revision,
                    server.timezone,
                    server.display_name
                );
                self.server = server;
                Ok(())
            }
            Response::Exception(e) => Err(e.into()),
            other => Err(Error::violation("Hello", other.kind())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn server_context(&self) -> &ServerContext {
        &self.server
    }

    pub fn client_context(&self) -> &ClientContext {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Flag checked between response reads. Setting it aborts the wait in
    /// progress with [`Error::Interrupted`]; it is cleared when observed.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub(crate) fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    pub(crate) fn send(&mut self, request: &Request<'_>) -> Result<()> {
        if self.closed {
            return Err(Error::violation("open session", "closed session"));
        }
        request.write(&mut self.writer, self.server.negotiated_revision())?;
        self.writer.flush_to_target(true)
    }

    pub(crate) fn receive(&mut self, timeout: Duration) -> Result<Response> {
        if self.closed {
            return Err(Error::violation("open session", "closed session"));
        }
        self.stream.set_read_timeout(Some(timeout))?;
        Response::read(&mut self.reader, &self.server)
    }

    /// Receives with the configured query timeout.
    pub(crate) fn receive_for_query(&mut self) -> Result<Response> {
        self.receive(self.config.query_timeout())
    }

    /// Sends `Ping` and waits up to `timeout` for `Pong`. Any failure is
    /// reported as `false`.
    pub fn ping(&mut self, timeout: Duration) -> bool {
        match self.try_ping(timeout) {
            Ok(()) => true,
            Err(e) => {
                warn!("ping failed: {e}");
                false
            }
        }
    }

    fn try_ping(&mut self, timeout: Duration) -> Result<()> {
        self.send(&Request::Ping)?;
        let deadline = Instant::now() + timeout;
        loop {
            self.check_interrupted()?;
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(Error::Timeout)?;
            match self.receive(remaining)? {
                Response::Pong => return Ok(()),
                other => debug!("skipping {other} while waiting for Pong"),
            }
        }
    }

    /// Sends a query followed by the empty block that ends external tables.
    pub(crate) fn send_query(
        &mut self,
        sql: &str,
        overrides: Option<&BTreeMap<String, SettingValue>>,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::violation("open session", "closed session"));
        }
        let settings = match overrides {
            Some(overrides) => {
                let mut merged = self.config.settings.clone();
                merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            }
            None => self.config.settings.clone(),
        };
        let query_id = Uuid::new_v4().to_string();
        let revision = self.server.negotiated_revision();
        debug!("query {query_id}: {sql}");

        Request::Query {
            query_id: &query_id,
            client: &self.client,
            settings: &settings,
            compression: self.compressed,
            sql,
        }
        .write(&mut self.writer, revision)?;
        Request::Data {
            table: "",
            block: &Block::empty(),
        }
        .write(&mut self.writer, revision)?;
        self.writer.flush_to_target(true)
    }

    /// Runs `sql` and streams its result.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult<'_>> {
        self.send_query(sql, None)?;
        QueryResult::new(self)
    }

    /// Like [`query`](Self::query), with settings layered over the configured ones.
    pub fn query_with_settings(
        &mut self,
        sql: &str,
        settings: &BTreeMap<String, SettingValue>,
    ) -> Result<QueryResult<'_>> {
        self.send_query(sql, Some(settings))?;
        QueryResult::new(self)
    }

    /// Runs `sql` to completion, returning the number of rows it produced.
    pub fn execute(&mut self, sql: &str) -> Result<usize> {
        let mut rows = 0;
        for block in self.query(sql)? {
            rows += block?.row_count();
        }
        Ok(rows)
    }

    /// Reads responses until the server sends the sample block of an insert.
    pub(crate) fn receive_sample_block(&mut self) -> Result<Block> {
        loop {
            self.check_interrupted()?;
            match self.receive_for_query()? {
                Response::Data { block, .. } => return Ok(block),
                Response::Exception(e) => return Err(e.into()),
                Response::EndOfStream => {
                    return Err(Error::violation("sample block", "EndOfStream"));
                }
                other => debug!("skipping {other} while waiting for sample block"),
            }
        }
    }

    pub(crate) fn wait_end_of_stream(&mut self) -> Result<()> {
        loop {
            match self.receive_for_query()? {
                Response::EndOfStream => return Ok(()),
                Response::Exception(e) => return Err(e.into()),
                other => debug!("skipping {other} while waiting for EndOfStream"),
            }
        }
    }

    pub(crate) fn send_data(&mut self, block: &Block) -> Result<()> {
        self.send(&Request::Data { table: "", block })
    }

    /// Sends the empty block that ends an insert and waits for the server.
    pub(crate) fn end_insert(&mut self) -> Result<()> {
        self.send_data(&Block::empty())?;
        self.wait_end_of_stream()
    }

    /// Prepares an insert whose VALUES clause may hold `?` placeholders.
    pub fn prepare_insert(&mut self, sql: &str) -> Result<PreparedInsert<'_>> {
        PreparedInsert::new(self, sql)
    }

    /// Inserts the literal rows of `sql` as one block, returning the row count.
    pub fn insert_values(&mut self, sql: &str) -> Result<usize> {
        let (head, at) = split_insert_query(sql)?;
        self.send_query(head, None)?;
        let sample = self.receive_sample_block()?;

        let mut block = Block::from_header(&sample)?;
        let rows = match ValuesParser::at(sql, at).parse_literal_rows(&mut block) {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(end) = self.end_insert() {
                    warn!("closing aborted insert: {end}");
                }
                return Err(e);
            }
        };
        self.send_data(&block)?;
        self.end_insert()?;
        info!("inserted {rows} rows");
        Ok(rows)
    }

    /// Flushes pending output and closes the connection. Closing twice is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            info!("session to {} already closed", self.config.address());
            return Ok(());
        }
        self.closed = true;
        let flushed = self.writer.flush_to_target(true);
        self.stream.shutdown()?;
        info!("disconnected from {}", self.config.address());
        flushed
    }

    /// [`disconnect`](Self::disconnect) for cleanup paths: failures are logged.
    pub fn silent_disconnect(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("disconnect from {} failed: {e}", self.config.address());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            self.silent_disconnect();
        }
    }
}
