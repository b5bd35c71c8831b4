//! Generates Verilog code.

use crate::codegen::*;
use crate::model::*;
use crate::utils::port_id_char;
use crate::vir::*;

/// Signals of one SMI channel, in declaration order.
const CHANNEL_SIGNALS: [&str; 4] = ["Ready", "Eofc", "Data", "Stop"];

const APACHE_LICENCE: [&str; 15] = [
    "",
    "Copyright 2018 ReconfigureIO",
    "",
    "Licensed under the Apache License, Version 2.0 (the \"License\");",
    "you may not use this file except in compliance with the License.",
    "You may obtain a copy of the License at",
    "",
    "    http://www.apache.org/licenses/LICENSE-2.0",
    "",
    "Unless required by applicable law or agreed to in writing, software",
    "distributed under the License is distributed on an \"AS IS\" BASIS,",
    "WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.",
    "See the License for the specific language governing permissions and",
    "limitations under the License.",
    "",
];

/// Fixed text used by the Verilog generator.
///
/// The table is built once and shared by reference; rendering never modifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragments {
    /// Licence comment lines at the top of every generated file. Omitted when empty.
    pub licence: Vec<String>,

    /// Comment lines following the licence.
    pub header: Vec<String>,

    /// Timescale directive argument.
    pub timescale: String,

    /// Clock signal name.
    pub clock: String,

    /// Synchronous reset signal name.
    pub reset: String,

    /// Module name prefix of the upscaling flit converters, completed by the scale factor.
    pub scale_up_module: String,

    /// Module name prefix of the downscaling flit converters, completed by the scale factor.
    pub scale_down_module: String,

    /// Module name prefix of plain arbiters, completed by the fan-in.
    pub arbiter_module: String,

    /// Module name prefix of scaling arbiters, completed by the fan-in.
    pub scaled_arbiter_module: String,
}

impl Default for Fragments {
    fn default() -> Self {
        Self {
            licence: APACHE_LICENCE.iter().map(|line| line.to_string()).collect(),
            header: vec![String::new(), "Machine generated file - DO NOT EDIT".to_string(), String::new()],
            timescale: "1ns/1ps".to_string(),
            clock: "clk".to_string(),
            reset: "srst".to_string(),
            scale_up_module: "smiFlitScaleX".to_string(),
            scale_down_module: "smiFlitScaleD".to_string(),
            arbiter_module: "smiTransactionArbiterX".to_string(),
            scaled_arbiter_module: "smiTransactionScaledArbiterX".to_string(),
        }
    }
}

/// Renders the arbitration tree as Verilog source.
pub fn render(fragments: &Fragments, config: &TreeConfig) -> Result<String, RenderError> {
    let virgen = Virgen::new(fragments);
    let module = gen_module(&virgen, config)?;
    Ok(virgen.finish(module).to_string())
}

/// Verilog IR Generator
#[derive(Debug, Clone, Copy)]
pub struct Virgen<'a> {
    fragments: &'a Fragments,
}

impl<'a> Virgen<'a> {
    /// Creates new generator using the given fragments.
    pub fn new(fragments: &'a Fragments) -> Self { Self { fragments } }

    /// Wraps the generated ports and body into a Verilog module.
    pub fn finish(&self, module: crate::codegen::Module<Self>) -> crate::vir::Module {
        crate::vir::Module {
            header: vec![self.fragments.licence.clone(), self.fragments.header.clone()],
            timescale: self.fragments.timescale.clone(),
            name: module.name,
            port_decls: module.ports,
            module_items: module.body,
        }
    }

    fn clock_connections(&self) -> PortConnections {
        PortConnections::new(vec![vec![
            (self.fragments.clock.clone(), Expression::ident(self.fragments.clock.as_str())),
            (self.fragments.reset.clone(), Expression::ident(self.fragments.reset.as_str())),
        ]])
    }
}

/// Port declarations of one channel. Payload signals are inputs if `inbound`; the stop signal flows the other way.
fn channel_ports(name: &str, flit_width: usize, inbound: bool) -> Vec<PortDeclaration> {
    CHANNEL_SIGNALS
        .iter()
        .map(|signal| {
            let ident = format!("{}{}", name, signal);
            let slice = channel_slice(signal, flit_width);
            if inbound == (*signal != "Stop") {
                PortDeclaration::input(slice, ident)
            } else {
                PortDeclaration::output(slice, ident)
            }
        })
        .collect()
}

fn channel_slice(signal: &str, flit_width: usize) -> Option<BitSlice> {
    match signal {
        "Eofc" => Some(BitSlice::bits(EOFC_WIDTH)),
        "Data" => Some(BitSlice::bytes(flit_width)),
        _ => None,
    }
}

/// Assigns the payload of channel `from` to channel `to` and the stop signal back.
fn channel_assigns(from: &str, to: &str) -> Vec<ContinuousAssign> {
    CHANNEL_SIGNALS
        .iter()
        .map(|signal| {
            let (lhs, rhs) = if *signal == "Stop" { (from, to) } else { (to, from) };
            ContinuousAssign::new(
                Expression::ident(format!("{}{}", lhs, signal)),
                Expression::ident(format!("{}{}", rhs, signal)),
            )
        })
        .collect()
}

/// Connects the ports `{port_prefix}Ready` etc. of an instance to the signals `{name}Ready` etc.
fn channel_connections(port_prefix: &str, name: &str) -> Vec<(String, Expression)> {
    CHANNEL_SIGNALS
        .iter()
        .map(|signal| (format!("{}{}", port_prefix, signal), Expression::ident(format!("{}{}", name, signal))))
        .collect()
}

fn ports_comment(conn: &Connection) -> Option<String> {
    Some(format!("SMI ports for {}/{}", conn.req_name, conn.resp_name))
}

impl<'a> Codegen for Virgen<'a> {
    type Item = ModuleItem;
    type Port = PortGroup;

    fn gen_client_ports(&self, conns: &[Connection]) -> Vec<PortGroup> {
        conns
            .iter()
            .map(|conn| {
                let mut ports = channel_ports(&conn.req_name, conn.flit_width, true);
                ports.extend(channel_ports(&conn.resp_name, conn.flit_width, false));
                PortGroup::new(ports_comment(conn), ports)
            })
            .collect()
    }

    fn gen_server_port(&self, conn: &Connection) -> Vec<PortGroup> {
        let mut ports = channel_ports(&conn.req_name, conn.flit_width, false);
        ports.extend(channel_ports(&conn.resp_name, conn.flit_width, true));
        vec![PortGroup::new(ports_comment(conn), ports)]
    }

    fn gen_system_ports(&self) -> Vec<PortGroup> {
        vec![PortGroup::new(Some("Specify system level signals.".to_string()), vec![
            PortDeclaration::input(None, self.fragments.clock.clone()),
            PortDeclaration::input(None, self.fragments.reset.clone()),
        ])]
    }

    fn gen_wire_list(&self, conns: &[Connection]) -> Vec<ModuleItem> {
        conns
            .iter()
            .map(|conn| {
                let decls = [&conn.req_name, &conn.resp_name]
                    .iter()
                    .flat_map(|name| {
                        CHANNEL_SIGNALS.iter().map(move |signal| {
                            Declaration::net(channel_slice(signal, conn.flit_width), format!("{}{}", name, signal))
                        })
                    })
                    .collect();
                ModuleItem::Commented(format!("SMI connections for {}/{}", conn.req_name, conn.resp_name), vec![
                    ModuleItem::Declarations(decls),
                ])
            })
            .collect()
    }

    fn gen_assignment(&self, assignment: &Assignment) -> Vec<ModuleItem> {
        let (client, server) = (&assignment.client, &assignment.server);
        vec![
            ModuleItem::Commented(format!("Directly map {} -> {}", client.req_name, server.req_name), vec![
                ModuleItem::ContinuousAssigns(channel_assigns(&client.req_name, &server.req_name)),
            ]),
            ModuleItem::Commented(format!("Directly map {} -> {}", server.resp_name, client.resp_name), vec![
                ModuleItem::ContinuousAssigns(channel_assigns(&server.resp_name, &client.resp_name)),
            ]),
        ]
    }

    fn gen_width_scaler(&self, scaler: &WidthScaler) -> Vec<ModuleItem> {
        let (client, server) = (&scaler.client, &scaler.server);

        let req = ModuleInstantiation::new(
            format!("{}{}", self.fragments.scale_up_module, scaler.scale_factor),
            format!("{}Req", scaler.name),
            vec![scaler.base_flit_width.into()],
            vec![
                PortConnections::new(vec![
                    channel_connections("smiIn", &client.req_name),
                    channel_connections("smiOut", &server.req_name),
                ]),
                self.clock_connections(),
            ],
        );
        let resp = ModuleInstantiation::new(
            format!("{}{}", self.fragments.scale_down_module, scaler.scale_factor),
            format!("{}Resp", scaler.name),
            vec![Expression::mul(scaler.base_flit_width.into(), scaler.scale_factor.into())],
            vec![
                PortConnections::new(vec![
                    channel_connections("smiIn", &server.resp_name),
                    channel_connections("smiOut", &client.resp_name),
                ]),
                self.clock_connections(),
            ],
        );

        vec![
            ModuleItem::Commented(format!("Instantiate SMI request scaler {}Req", scaler.name), vec![
                ModuleItem::ModuleInstantiation(req),
            ]),
            ModuleItem::Commented(format!("Instantiate SMI response scaler {}Resp", scaler.name), vec![
                ModuleItem::ModuleInstantiation(resp),
            ]),
        ]
    }

    fn gen_arbiter(&self, arbiter: &Arbiter) -> Vec<ModuleItem> {
        let module_prefix =
            if arbiter.scaled { &self.fragments.scaled_arbiter_module } else { &self.fragments.arbiter_module };

        let mut port_connections = arbiter
            .clients
            .iter()
            .zip((0..).map_while(port_id_char))
            .map(|(client, id)| {
                let mut conns = channel_connections(&format!("smiReq{}In", id), &client.req_name);
                conns.extend(channel_connections(&format!("smiResp{}Out", id), &client.resp_name));
                PortConnections::new(vec![conns])
            })
            .collect::<Vec<_>>();
        let mut server_conns = channel_connections("smiReqOut", &arbiter.server.req_name);
        server_conns.extend(channel_connections("smiRespIn", &arbiter.server.resp_name));
        port_connections.push(PortConnections::new(vec![server_conns]));
        port_connections.push(self.clock_connections());

        let inst = ModuleInstantiation::new(
            format!("{}{}", module_prefix, arbiter.fan_in()),
            arbiter.name.clone(),
            vec![
                arbiter.flit_width.into(),
                arbiter.tag_id_width.into(),
                arbiter.fifo_flit_depth.into(),
                arbiter.fifo_frame_depth.into(),
            ],
            port_connections,
        );

        vec![ModuleItem::Commented(format!("Instantiate transaction arbiter {}", arbiter.name), vec![
            ModuleItem::ModuleInstantiation(inst),
        ])]
    }
}
