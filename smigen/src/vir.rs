//! Verilog IR.

use itertools::Itertools;

use crate::utils::{bit_slice_from_scaled_width, indent};

const INDENT: usize = 2;

/// Module.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Module {
    /// Comment blocks at the top of the file, separated by a blank line. Empty blocks are skipped.
    pub header: Vec<Vec<String>>,

    /// Timescale directive argument, e.g. `1ns/1ps`.
    pub timescale: String,

    /// Module name.
    pub name: String,

    /// Port declarations.
    pub port_decls: Vec<PortGroup>,

    /// Module items.
    pub module_items: Vec<ModuleItem>,
}

impl ToString for Module {
    fn to_string(&self) -> String {
        format!(
            "{}\n\n`timescale {}\n\nmodule {} (\n{}\n);\n\n{}\n\nendmodule\n",
            self.header.iter().filter(|block| !block.is_empty()).map(|block| gen_verilog_comment(block)).join("\n\n"),
            self.timescale,
            self.name,
            indent(gen_verilog_ports(&self.port_decls), INDENT),
            indent(gen_verilog_module(&self.module_items), INDENT)
        )
    }
}

/// Generates a comment block, one `//` line per entry.
pub fn gen_verilog_comment(lines: &[String]) -> String {
    lines.iter().map(|line| if line.is_empty() { "//".to_string() } else { format!("// {}", line) }).join("\n")
}

/// Module item.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ModuleItem {
    /// Declarations.
    Declarations(Vec<Declaration>),

    /// Continuous assignments.
    ContinuousAssigns(Vec<ContinuousAssign>),

    /// Module instantiation.
    ModuleInstantiation(ModuleInstantiation),

    /// Comment line followed by items.
    Commented(String, Vec<ModuleItem>),
}

impl ToString for ModuleItem {
    fn to_string(&self) -> String {
        match self {
            ModuleItem::Declarations(decls) => decls.iter().map(|decl| decl.to_string()).join("\n"),
            ModuleItem::ContinuousAssigns(conts) => gen_verilog_conts(conts),
            ModuleItem::ModuleInstantiation(module_inst) => module_inst.to_string(),
            ModuleItem::Commented(comment, items) => {
                format!("// {}\n{}", comment, items.iter().map(|item| item.to_string()).join("\n"))
            }
        }
    }
}

/// Generates Verilog code for module items.
pub fn gen_verilog_module(module: &[ModuleItem]) -> String { module.iter().map(|item| item.to_string()).join("\n\n") }

/// Bit slice of a multi-bit signal, `[width * scaling - 1:0]`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct BitSlice {
    /// Logical width.
    pub width: usize,

    /// Number of bits per unit of `width`.
    pub scaling: usize,
}

impl BitSlice {
    /// Slice covering `bytes` bytes.
    pub fn bytes(bytes: usize) -> Self { Self { width: bytes, scaling: 8 } }

    /// Slice covering `bits` bits.
    pub fn bits(bits: usize) -> Self { Self { width: bits, scaling: 1 } }
}

impl ToString for BitSlice {
    fn to_string(&self) -> String { bit_slice_from_scaled_width(self.width, self.scaling) }
}

fn slice_column(slice: &Option<BitSlice>) -> String {
    format!("{:7}", slice.as_ref().map_or_else(String::new, |slice| slice.to_string()))
}

/// Port declaration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PortDeclaration {
    /// Input declaration.
    Input(Option<BitSlice>, String),

    /// Output declaration.
    Output(Option<BitSlice>, String),
}

impl ToString for PortDeclaration {
    fn to_string(&self) -> String {
        match self {
            Self::Input(slice, ident) => format!("{:<6} {} {}", "input", slice_column(slice), ident),
            Self::Output(slice, ident) => format!("{:<6} {} {}", "output", slice_column(slice), ident),
        }
    }
}

impl PortDeclaration {
    /// Creates new input port declaration.
    pub fn input(slice: Option<BitSlice>, ident: String) -> Self { Self::Input(slice, ident) }

    /// Creates new output port declaration.
    pub fn output(slice: Option<BitSlice>, ident: String) -> Self { Self::Output(slice, ident) }
}

/// Group of port declarations preceded by an optional comment.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortGroup {
    /// Comment.
    pub comment: Option<String>,

    /// Ports.
    pub ports: Vec<PortDeclaration>,
}

impl PortGroup {
    /// Creates new port group.
    pub fn new(comment: Option<String>, ports: Vec<PortDeclaration>) -> Self { Self { comment, ports } }
}

/// Generates Verilog code for the port list. Every port but the last one is followed by a comma.
pub fn gen_verilog_ports(groups: &[PortGroup]) -> String {
    let num_ports = groups.iter().map(|group| group.ports.len()).sum::<usize>();
    let mut index = 0;

    groups
        .iter()
        .map(|group| {
            let ports = group.ports.iter().map(|port| {
                index += 1;
                format!("{}{}", port.to_string(), if index < num_ports { "," } else { "" })
            });
            group.comment.iter().map(|comment| format!("// {}", comment)).chain(ports).join("\n")
        })
        .join("\n\n")
}

/// Declaration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Declaration {
    /// Net declaration.
    Net(Option<BitSlice>, String),
}

impl Declaration {
    /// Net declaration.
    #[inline]
    pub fn net(slice: Option<BitSlice>, ident: String) -> Self { Declaration::Net(slice, ident) }
}

impl ToString for Declaration {
    fn to_string(&self) -> String {
        match self {
            Self::Net(slice, ident) => format!("wire {} {};", slice_column(slice), ident),
        }
    }
}

/// Continuous assign.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ContinuousAssign(pub Expression, pub Expression);

/// Generates verilog code for continuous assigns.
pub fn gen_verilog_conts(conts: &[ContinuousAssign]) -> String { conts.iter().map(|cont| cont.to_string()).join("\n") }

impl ToString for ContinuousAssign {
    fn to_string(&self) -> String { format!("assign {} = {};", self.0.to_string(), self.1.to_string()) }
}

impl ContinuousAssign {
    /// Creates new continuous assign.
    pub fn new(lvalue: Expression, expr: Expression) -> Self { Self(lvalue, expr) }
}

/// Module instantiation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ModuleInstantiation {
    /// Module name.
    pub module_name: String,

    /// Inst name.
    pub inst_name: String,

    /// Positional parameters.
    pub params: Vec<Expression>,

    /// Named port connections.
    pub port_connections: Vec<PortConnections>,
}

/// Named port connections whose port names share one column, in groups separated by a blank line.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PortConnections {
    /// Groups of `(port name, expression)` pairs.
    pub groups: Vec<Vec<(String, Expression)>>,
}

impl PortConnections {
    /// Creates new block of port connection groups.
    pub fn new(groups: Vec<Vec<(String, Expression)>>) -> Self { Self { groups } }

    fn column_width(&self) -> usize {
        self.groups.iter().flatten().map(|(port_name, _)| port_name.len()).max().unwrap_or(0)
    }
}

impl ToString for ModuleInstantiation {
    fn to_string(&self) -> String {
        let params = if self.params.is_empty() {
            String::new()
        } else {
            format!(" #({})", self.params.iter().map(|param| param.to_string()).join(", "))
        };
        let num_ports = self.port_connections.iter().flat_map(|block| &block.groups).map(Vec::len).sum::<usize>();
        let mut index = 0;

        let port_connections = self
            .port_connections
            .iter()
            .flat_map(|block| {
                let width = block.column_width();
                block.groups.iter().map(move |group| (width, group))
            })
            .filter(|(_, group)| !group.is_empty())
            .map(|(width, group)| {
                group
                    .iter()
                    .map(|(port_name, expr)| {
                        index += 1;
                        format!(
                            ".{:<width$} ({}){}",
                            port_name,
                            expr.to_string(),
                            if index < num_ports { "," } else { "" },
                            width = width
                        )
                    })
                    .join("\n")
            })
            .join("\n\n");

        format!("{}{} {} (\n{}\n);", self.module_name, params, self.inst_name, indent(port_connections, INDENT))
    }
}

impl ModuleInstantiation {
    /// Creates new module instantiation.
    pub fn new(
        module_name: String, inst_name: String, params: Vec<Expression>, port_connections: Vec<PortConnections>,
    ) -> Self {
        Self { module_name, inst_name, params, port_connections }
    }
}

/// Expression.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Expression {
    /// Number.
    Number(usize),

    /// Identifier.
    Identifier(String),

    /// Product of two expressions.
    Mul(Box<Expression>, Box<Expression>),
}

impl ToString for Expression {
    fn to_string(&self) -> String {
        match self {
            Self::Number(num) => num.to_string(),
            Self::Identifier(ident) => ident.clone(),
            Self::Mul(lhs, rhs) => format!("{}*{}", lhs.to_string(), rhs.to_string()),
        }
    }
}

impl From<String> for Expression {
    fn from(ident: String) -> Self { Expression::ident(ident) }
}

impl From<usize> for Expression {
    fn from(num: usize) -> Self { Expression::Number(num) }
}

impl Expression {
    /// Identifier.
    pub fn ident<S: Into<String>>(ident: S) -> Self { Self::Identifier(ident.into()) }

    /// Product.
    pub fn mul(lhs: Expression, rhs: Expression) -> Self { Self::Mul(Box::new(lhs), Box::new(rhs)) }
}
