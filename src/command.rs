use embedded_error::mci::MciError;

/// Max wait for ordinary commands. Timeouts are the safety net on hosts
/// without a card-detect line: with the card gone mid-command, nothing
/// else ends the exchange.
pub const DEFAULT_CMD_TIMEOUT_MS: u32 = 1_000;
/// Max wait for write commands, which also cover card-side programming.
pub const WRITE_CMD_TIMEOUT_MS: u32 = 5_000;

/// Expected response shape of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// No response at all.
    None,
    /// 48-bit response carrying one payload word (R1/R3/R6/R7).
    Short,
    /// Short response followed by a busy phase on the data line (R1b).
    ShortBusy,
    /// 136-bit register response (R2).
    Long,
}

/// Data phase direction and buffer.
pub enum Data<'a> {
    /// Card-to-host transfer.
    Read(&'a mut [u8]),
    /// Host-to-card transfer.
    Write(&'a [u8]),
}

impl Data<'_> {
    pub fn len(&self) -> usize {
        match self {
            Data::Read(buf) => buf.len(),
            Data::Write(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Data::Read(_))
    }
}

/// One command transaction, built by [`crate::commands`] and consumed by a
/// single dispatch. The host executor fills `response`, and `error` when
/// the failure is specific to this command.
pub struct Command<'a> {
    pub opcode: u8,
    pub arg: u32,
    pub response_kind: ResponseKind,
    pub data: Option<Data<'a>>,
    /// Transfer block length; zero when there is no data phase.
    pub block_len: usize,
    /// Descriptor timeout; zero lets the dispatcher pick the default.
    pub timeout_ms: u32,
    /// Response words in the native register convention (see
    /// [`crate::host::Host`]).
    pub response: [u32; 4],
    /// Per-command failure reported by the executor.
    pub error: Option<MciError>,
}

impl<'a> Command<'a> {
    /// Descriptor without a data phase.
    pub fn new(opcode: u8, arg: u32, response_kind: ResponseKind) -> Self {
        Command {
            opcode,
            arg,
            response_kind,
            data: None,
            block_len: 0,
            timeout_ms: 0,
            response: [0; 4],
            error: None,
        }
    }

    /// Descriptor carrying a data phase of whole `block_len` blocks.
    pub fn adtc(
        opcode: u8,
        arg: u32,
        response_kind: ResponseKind,
        data: Data<'a>,
        block_len: usize,
    ) -> Self {
        Command {
            opcode,
            arg,
            response_kind,
            data: Some(data),
            block_len,
            timeout_ms: 0,
            response: [0; 4],
            error: None,
        }
    }

    pub(crate) fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Data::len)
    }
}
