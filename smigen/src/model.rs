//! Connection model of an arbitration tree.
//!
//! All values here are plain data. A [`TreeConfig`] owns every connection and component by value, and components
//! refer to connections by copy rather than by reference.

use std::collections::HashSet;

use crate::utils::port_id_num;

/// Width of the end-of-frame-count field of every SMI channel, in bits.
pub const EOFC_WIDTH: usize = 8;

/// Flit width of every client side connection, in bytes.
pub const CLIENT_FLIT_WIDTH: usize = 8;

/// One SMI memory bus link: a request channel towards the server and a response channel back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Signal name prefix of the request channel.
    pub req_name: String,

    /// Signal name prefix of the response channel.
    pub resp_name: String,

    /// Number of bytes in each flit.
    pub flit_width: usize,
}

impl Connection {
    /// Creates new connection.
    pub fn new<R: Into<String>, S: Into<String>>(req_name: R, resp_name: S, flit_width: usize) -> Self {
        Self { req_name: req_name.into(), resp_name: resp_name.into(), flit_width }
    }

    /// Creates the `index`-th client side connection (`smiMemClientReq{index}`/`smiMemClientResp{index}`).
    pub fn client(index: usize) -> Self {
        Self::new(port_id_num("smiMemClientReq", index), port_id_num("smiMemClientResp", index), CLIENT_FLIT_WIDTH)
    }

    /// Creates the server side connection (`smiMemServerReq`/`smiMemServerResp`).
    pub fn server(flit_width: usize) -> Self { Self::new("smiMemServerReq", "smiMemServerResp", flit_width) }
}

/// Direct pass-through wiring between two connections of equal width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Client side connection.
    pub client: Connection,

    /// Server side connection.
    pub server: Connection,
}

/// Bus width conversion between a narrow client side and a wide server side connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthScaler {
    /// Base name of the request and response scaler instances.
    pub name: String,

    /// Ratio of the server side flit width to the client side flit width.
    pub scale_factor: usize,

    /// Number of bytes in each client side flit.
    pub base_flit_width: usize,

    /// Client side connection.
    pub client: Connection,

    /// Server side connection.
    pub server: Connection,
}

/// Frame level M-to-1 transaction arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbiter {
    /// Instance name.
    pub name: String,

    /// Depth of the internal flit FIFOs.
    pub fifo_flit_depth: usize,

    /// Maximum number of frames held per FIFO.
    pub fifo_frame_depth: usize,

    /// Number of bytes in each client side flit.
    pub flit_width: usize,

    /// Number of bits used for transaction ID tagging.
    pub tag_id_width: usize,

    /// Doubles the flit width on the server side when set.
    pub scaled: bool,

    /// Client side connections.
    pub clients: Vec<Connection>,

    /// Server side connection.
    pub server: Connection,
}

impl Arbiter {
    /// Number of clients merged by the arbiter.
    pub fn fan_in(&self) -> usize { self.clients.len() }

    /// Flit width expected on the server side connection.
    pub fn server_flit_width(&self) -> usize {
        if self.scaled {
            self.flit_width * 2
        } else {
            self.flit_width
        }
    }
}

/// A component of the arbitration tree body.
#[derive(Debug, Clone, Copy)]
pub enum Component<'a> {
    /// Direct assignment.
    Assignment(&'a Assignment),

    /// Bus width scaler.
    WidthScaler(&'a WidthScaler),

    /// Transaction arbiter.
    Arbiter(&'a Arbiter),
}

/// A complete arbitration tree module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeConfig {
    /// Module name.
    pub module_name: String,

    /// Client side connections, exposed as module ports.
    pub client_conns: Vec<Connection>,

    /// Server side connection, exposed as module port. Always holds exactly one connection.
    pub server_conns: Vec<Connection>,

    /// Internal wires.
    pub wire_conns: Vec<Connection>,

    /// Direct assignments.
    pub assignments: Vec<Assignment>,

    /// Bus width scalers.
    pub scalers: Vec<WidthScaler>,

    /// Transaction arbiters.
    pub arbiters: Vec<Arbiter>,
}

impl TreeConfig {
    /// Creates new empty configuration for the given module.
    pub fn new<S: Into<String>>(module_name: S) -> Self { Self { module_name: module_name.into(), ..Self::default() } }

    /// Returns the server side connection.
    pub fn server_conn(&self) -> Option<&Connection> {
        match self.server_conns.as_slice() {
            [conn] => Some(conn),
            _ => None,
        }
    }

    /// Components in rendering order: assignments, then scalers, then arbiters.
    pub fn components(&self) -> impl Iterator<Item = Component<'_>> {
        self.assignments
            .iter()
            .map(Component::Assignment)
            .chain(self.scalers.iter().map(Component::WidthScaler))
            .chain(self.arbiters.iter().map(Component::Arbiter))
    }

    /// Every connection declared by the module: ports first, then wires.
    pub fn declared_conns(&self) -> impl Iterator<Item = &Connection> {
        self.client_conns.iter().chain(self.server_conns.iter()).chain(self.wire_conns.iter())
    }

    /// Returns `true` if no request or response name is declared twice.
    pub fn has_unique_names(&self) -> bool {
        let mut names = HashSet::new();
        self.declared_conns().all(|conn| names.insert(conn.req_name.as_str()) && names.insert(conn.resp_name.as_str()))
    }
}
