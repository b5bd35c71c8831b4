//! Generates target code from an arbitration tree configuration.

use thiserror::Error;

use crate::model::*;
use crate::utils::PORT_ID_CHAR_LIMIT;

/// Rendering errors. These indicate a configuration that the fragment renderers cannot express.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("expected exactly one server connection, found {0}")]
    ServerCount(usize),

    #[error("connection {0} has zero flit width")]
    ZeroFlitWidth(String),

    #[error("{component}: {reason}")]
    Mismatch { component: String, reason: String },
}

impl RenderError {
    fn mismatch<S: Into<String>>(component: &str, reason: S) -> Self {
        Self::Mismatch { component: component.to_string(), reason: reason.into() }
    }
}

/// IR-level module.
#[derive(Debug)]
pub struct Module<C: Codegen> {
    /// Name of the module
    pub name: String,

    /// Ports of the module
    pub ports: Vec<C::Port>,

    /// Body of the module
    pub body: Vec<C::Item>,
}

impl<C: Codegen> Module<C> {
    /// Creates new module.
    fn new(name: String, ports: Vec<C::Port>, body: Vec<C::Item>) -> Self { Module { name, ports, body } }
}

/// Generates target code, one fragment per part of the arbitration tree.
pub trait Codegen {
    /// Port list entry.
    type Port;

    /// Module body entry.
    type Item;

    /// Generates the port list of the client side connections.
    fn gen_client_ports(&self, conns: &[Connection]) -> Vec<Self::Port>;

    /// Generates the port list of the server side connection.
    fn gen_server_port(&self, conn: &Connection) -> Vec<Self::Port>;

    /// Generates the system level ports (clock and reset).
    fn gen_system_ports(&self) -> Vec<Self::Port>;

    /// Generates the internal wire declarations.
    fn gen_wire_list(&self, conns: &[Connection]) -> Vec<Self::Item>;

    /// Generates a direct assignment.
    fn gen_assignment(&self, assignment: &Assignment) -> Vec<Self::Item>;

    /// Generates a bus width scaler.
    fn gen_width_scaler(&self, scaler: &WidthScaler) -> Vec<Self::Item>;

    /// Generates a transaction arbiter.
    fn gen_arbiter(&self, arbiter: &Arbiter) -> Vec<Self::Item>;
}

/// Generates target code for the arbitration tree with the given compiler.
///
/// Ports are emitted as clients, server, then system signals. The body holds the wire declarations followed by the
/// assignments, scalers and arbiters, in that order. A scaler with scale factor 1 is generated as an assignment.
/// Every component is checked against its connections first, so a returned module is always complete.
pub fn gen_module<C: Codegen>(codegen: &C, config: &TreeConfig) -> Result<Module<C>, RenderError> {
    let server = config.server_conn().ok_or(RenderError::ServerCount(config.server_conns.len()))?;
    for conn in config.declared_conns() {
        check_connection(conn)?;
    }

    let mut ports = codegen.gen_client_ports(&config.client_conns);
    ports.extend(codegen.gen_server_port(server));
    ports.extend(codegen.gen_system_ports());

    let mut body = codegen.gen_wire_list(&config.wire_conns);
    for component in config.components() {
        check_component(component)?;
        body.extend(match component {
            Component::Assignment(assignment) => codegen.gen_assignment(assignment),
            Component::WidthScaler(scaler) if scaler.scale_factor == 1 => {
                codegen.gen_assignment(&Assignment { client: scaler.client.clone(), server: scaler.server.clone() })
            }
            Component::WidthScaler(scaler) => codegen.gen_width_scaler(scaler),
            Component::Arbiter(arbiter) => codegen.gen_arbiter(arbiter),
        });
    }

    Ok(Module::new(config.module_name.clone(), ports, body))
}

fn check_connection(conn: &Connection) -> Result<(), RenderError> {
    if conn.flit_width == 0 {
        return Err(RenderError::ZeroFlitWidth(conn.req_name.clone()));
    }
    Ok(())
}

/// Checks that the component's connection widths agree with its parameters.
fn check_component(component: Component<'_>) -> Result<(), RenderError> {
    match component {
        Component::Assignment(assignment) => {
            check_connection(&assignment.client)?;
            check_connection(&assignment.server)?;
            if assignment.client.flit_width != assignment.server.flit_width {
                return Err(RenderError::mismatch(
                    &assignment.client.req_name,
                    format!(
                        "cannot assign {} byte flits to {} byte flits of {}",
                        assignment.client.flit_width, assignment.server.flit_width, assignment.server.req_name
                    ),
                ));
            }
        }
        Component::WidthScaler(scaler) => {
            check_connection(&scaler.client)?;
            check_connection(&scaler.server)?;
            if !matches!(scaler.scale_factor, 1 | 2 | 4 | 8) {
                return Err(RenderError::mismatch(
                    &scaler.name,
                    format!("unsupported scale factor {}", scaler.scale_factor),
                ));
            }
            if scaler.client.flit_width != scaler.base_flit_width
                || scaler.server.flit_width != scaler.base_flit_width * scaler.scale_factor
            {
                return Err(RenderError::mismatch(
                    &scaler.name,
                    format!(
                        "expected {} to {} byte flits, found {} to {}",
                        scaler.base_flit_width,
                        scaler.base_flit_width * scaler.scale_factor,
                        scaler.client.flit_width,
                        scaler.server.flit_width
                    ),
                ));
            }
        }
        Component::Arbiter(arbiter) => {
            check_connection(&arbiter.server)?;
            if arbiter.fan_in() < 2 || arbiter.fan_in() > PORT_ID_CHAR_LIMIT {
                return Err(RenderError::mismatch(&arbiter.name, format!("unsupported fan-in {}", arbiter.fan_in())));
            }
            if let Some(client) = arbiter.clients.iter().find(|client| client.flit_width != arbiter.flit_width) {
                return Err(RenderError::mismatch(
                    &arbiter.name,
                    format!(
                        "client {} has {} byte flits, expected {}",
                        client.req_name, client.flit_width, arbiter.flit_width
                    ),
                ));
            }
            if arbiter.server.flit_width != arbiter.server_flit_width() {
                return Err(RenderError::mismatch(
                    &arbiter.name,
                    format!(
                        "server {} has {} byte flits, expected {}",
                        arbiter.server.req_name,
                        arbiter.server.flit_width,
                        arbiter.server_flit_width()
                    ),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lists the fragments it is asked for.
    #[derive(Debug, Default)]
    struct Trace;

    impl Codegen for Trace {
        type Item = String;
        type Port = String;

        fn gen_client_ports(&self, conns: &[Connection]) -> Vec<String> {
            conns.iter().map(|conn| format!("client {}", conn.req_name)).collect()
        }

        fn gen_server_port(&self, conn: &Connection) -> Vec<String> { vec![format!("server {}", conn.req_name)] }

        fn gen_system_ports(&self) -> Vec<String> { vec!["clk".to_string(), "srst".to_string()] }

        fn gen_wire_list(&self, conns: &[Connection]) -> Vec<String> {
            conns.iter().map(|conn| format!("wire {}", conn.req_name)).collect()
        }

        fn gen_assignment(&self, assignment: &Assignment) -> Vec<String> {
            vec![format!("assign {}", assignment.client.req_name)]
        }

        fn gen_width_scaler(&self, scaler: &WidthScaler) -> Vec<String> { vec![format!("scaler {}", scaler.name)] }

        fn gen_arbiter(&self, arbiter: &Arbiter) -> Vec<String> { vec![format!("arbiter {}", arbiter.name)] }
    }

    fn arbiter(clients: Vec<Connection>, server: Connection, scaled: bool) -> Arbiter {
        Arbiter {
            name: "arb".to_string(),
            fifo_flit_depth: 32,
            fifo_frame_depth: 4,
            flit_width: 8,
            tag_id_width: 4,
            scaled,
            clients,
            server,
        }
    }

    #[test]
    fn fragments_are_composed_in_order() {
        let mut config = TreeConfig::new("m");
        config.client_conns = vec![Connection::client(0), Connection::client(1)];
        config.server_conns = vec![Connection::server(16)];
        config.wire_conns = vec![Connection::new("w0", "v0", 8), Connection::new("w1", "v1", 16)];
        config.arbiters.push(arbiter(config.wire_conns[..1].to_vec(), Connection::server(16), true));
        config.arbiters[0].clients.push(Connection::client(0));
        config.scalers.push(WidthScaler {
            name: "s".to_string(),
            scale_factor: 2,
            base_flit_width: 8,
            client: Connection::client(1),
            server: config.wire_conns[1].clone(),
        });
        config.assignments.push(Assignment { client: Connection::client(0), server: config.wire_conns[0].clone() });

        let module = gen_module(&Trace, &config).unwrap();
        assert_eq!(module.name, "m");
        assert_eq!(module.ports, [
            "client smiMemClientReq0",
            "client smiMemClientReq1",
            "server smiMemServerReq",
            "clk",
            "srst"
        ]);
        assert_eq!(module.body, ["wire w0", "wire w1", "assign smiMemClientReq0", "scaler s", "arbiter arb"]);
    }

    #[test]
    fn unit_scaler_is_generated_as_assignment() {
        let mut config = TreeConfig::new("m");
        config.client_conns = vec![Connection::client(0)];
        config.server_conns = vec![Connection::server(8)];
        config.scalers.push(WidthScaler {
            name: "busWidthScaler".to_string(),
            scale_factor: 1,
            base_flit_width: 8,
            client: Connection::client(0),
            server: Connection::server(8),
        });

        let module = gen_module(&Trace, &config).unwrap();
        assert_eq!(module.body, ["assign smiMemClientReq0"]);
    }

    #[test]
    fn server_must_be_singleton() {
        let config = TreeConfig::new("m");
        assert_eq!(gen_module(&Trace, &config).unwrap_err(), RenderError::ServerCount(0));
    }

    #[test]
    fn zero_width_connection_is_rejected() {
        let mut config = TreeConfig::new("m");
        config.server_conns.push(Connection::server(0));
        assert_eq!(gen_module(&Trace, &config).unwrap_err(), RenderError::ZeroFlitWidth("smiMemServerReq".to_string()));
    }

    #[test]
    fn mismatched_components_are_rejected() {
        let assignment = Assignment { client: Connection::client(0), server: Connection::server(16) };
        assert!(check_component(Component::Assignment(&assignment)).is_err());

        let scaler = WidthScaler {
            name: "s".to_string(),
            scale_factor: 3,
            base_flit_width: 8,
            client: Connection::client(0),
            server: Connection::server(24),
        };
        assert!(check_component(Component::WidthScaler(&scaler)).is_err());

        let unit = WidthScaler { scale_factor: 1, server: Connection::server(16), ..scaler.clone() };
        assert!(check_component(Component::WidthScaler(&unit)).is_err());

        let scaler = WidthScaler { scale_factor: 4, server: Connection::server(16), ..scaler };
        assert!(check_component(Component::WidthScaler(&scaler)).is_err());

        let single = arbiter(vec![Connection::client(0)], Connection::server(8), false);
        assert!(check_component(Component::Arbiter(&single)).is_err());

        let unscaled = arbiter(vec![Connection::client(0), Connection::client(1)], Connection::server(16), false);
        assert!(matches!(check_component(Component::Arbiter(&unscaled)), Err(RenderError::Mismatch { .. })));

        let scaled = arbiter(vec![Connection::client(0), Connection::client(1)], Connection::server(16), true);
        assert_eq!(check_component(Component::Arbiter(&scaled)), Ok(()));

        let wide_client = arbiter(vec![Connection::client(0), Connection::server(16)], Connection::server(16), true);
        assert!(check_component(Component::Arbiter(&wide_client)).is_err());
    }
}
