//! Topology synthesis of arbitration trees.
//!
//! Given a client count and a bus width scaling factor, [`synthesize`] builds the [`TreeConfig`] of a balanced tree
//! of arbiters and width scalers. Four strategies are used depending on the client count:
//!
//! - 1 client: a single width scaler, or a direct assignment when no scaling is needed.
//! - 2 to 3 clients: per-client width scalers feeding a single arbiter.
//! - 4 to 64 clients: a three layer tree of arbiters, with width scaling spread across the layers.
//! - anything else is rejected.
//!
//! Downstream kernel adaptors and testbenches depend on the generated names, so every name produced here is part
//! of the output contract.

use log::{debug, info};
use thiserror::Error;

use crate::model::*;
use crate::utils::port_id_num;

/// Largest number of clients supported by the three layer tree.
pub const MAX_CLIENTS: usize = 64;

/// Depth of the internal flit FIFOs of every arbiter.
pub const FIFO_FLIT_DEPTH: usize = 32;

/// Maximum number of frames held per arbiter FIFO.
pub const FIFO_FRAME_DEPTH: usize = 4;

/// Number of bits used for transaction ID tagging in every arbiter.
pub const TAG_ID_WIDTH: usize = 4;

/// Synthesis errors.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("invalid number of SMI clients ({0}) for arbitration tree")]
    InvalidClientCount(usize),

    #[error("unsupported number of SMI clients ({0}) for arbitration tree")]
    UnsupportedClientCount(usize),

    #[error("invalid bus scaling ({0}) for arbitration tree")]
    InvalidScalingFactor(usize),

    #[error("invalid AXI bus width ({0}) for arbitration tree")]
    InvalidAxiBusWidth(usize),
}

/// Ratio of the server side flit width to the 8 byte client side flit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingFactor {
    /// 64 bit server side data path.
    X1,

    /// 128 bit server side data path.
    X2,

    /// 256 bit server side data path.
    X4,

    /// 512 bit server side data path.
    X8,
}

impl ScalingFactor {
    /// All supported scaling factors.
    pub const ALL: [ScalingFactor; 4] = [Self::X1, Self::X2, Self::X4, Self::X8];

    /// Returns the numeric factor.
    pub fn factor(self) -> usize {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }

    /// Returns the server side flit width in bytes.
    pub fn server_flit_width(self) -> usize { self.factor() * CLIENT_FLIT_WIDTH }

    /// Converts an AXI data bus width in bits (64, 128, 256 or 512) into a scaling factor.
    pub fn from_axi_bus_width(bits: usize) -> Result<Self, SynthError> {
        match bits {
            64 => Ok(Self::X1),
            128 => Ok(Self::X2),
            256 => Ok(Self::X4),
            512 => Ok(Self::X8),
            _ => Err(SynthError::InvalidAxiBusWidth(bits)),
        }
    }
}

impl TryFrom<usize> for ScalingFactor {
    type Error = SynthError;

    fn try_from(factor: usize) -> Result<Self, Self::Error> {
        match factor {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            _ => Err(SynthError::InvalidScalingFactor(factor)),
        }
    }
}

/// Returns the conventional module name of an arbitration tree, e.g. `smiMemArbitrationTreeX4S2`.
pub fn arbitration_tree_module_name(num_clients: usize, scaling: ScalingFactor) -> String {
    format!("smiMemArbitrationTreeX{}S{}", num_clients, scaling.factor())
}

/// Builds the arbitration tree configuration for `num_clients` client ports.
pub fn synthesize(module_name: &str, num_clients: usize, scaling: ScalingFactor) -> Result<TreeConfig, SynthError> {
    let config = match num_clients {
        0 => return Err(SynthError::InvalidClientCount(num_clients)),
        1 => single_client(module_name, scaling),
        2..=3 => single_arbiter(module_name, num_clients, scaling),
        4..=MAX_CLIENTS => three_layer_tree(module_name, num_clients, scaling),
        _ => return Err(SynthError::UnsupportedClientCount(num_clients)),
    };

    info!(
        "{}: {} clients, {} arbiters, {} scalers, {} assignments",
        config.module_name,
        config.client_conns.len(),
        config.arbiters.len(),
        config.scalers.len(),
        config.assignments.len()
    );

    Ok(config)
}

/// Fan-ins of the three layer tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FanIns {
    /// Fan-in of the single layer-0 arbiter.
    pub(crate) layer0: usize,

    /// Fan-in of every layer-1 arbiter.
    pub(crate) layer1: usize,

    /// Fan-in of every layer-2 slot, in slot order.
    pub(crate) layer2: Vec<usize>,
}

impl FanIns {
    /// Computes the fan-ins for `num_clients` clients, with `num_clients` in `4..=MAX_CLIENTS`.
    pub(crate) fn new(num_clients: usize) -> Self {
        let layer0 = ceil_cbrt(num_clients);
        debug!("  fanInLayer0 = {} (avg {:.6})", layer0, (num_clients as f64).cbrt());

        let layer1 = ceil_sqrt_ratio(num_clients, layer0);
        debug!("  fanInLayer1 = {} (avg {:.6})", layer1, (num_clients as f64 / layer0 as f64).sqrt());

        let layer2 = partition(num_clients, layer0 * layer1);
        debug!("  fanInsLayer2 = {:?}", layer2);

        Self { layer0, layer1, layer2 }
    }

    /// Number of layer-2 slots.
    pub(crate) fn num_servers(&self) -> usize { self.layer0 * self.layer1 }
}

/// Smallest `k >= 1` with `k^3 >= n`.
fn ceil_cbrt(n: usize) -> usize {
    let mut k: usize = 1;
    while k.checked_pow(3).map_or(false, |cube| cube < n) {
        k += 1;
    }
    k
}

/// Smallest `k >= 1` with `k^2 >= n / d`, for `d >= 1`.
fn ceil_sqrt_ratio(n: usize, d: usize) -> usize {
    let mut k: usize = 1;
    while k.checked_mul(k).and_then(|square| square.checked_mul(d)).map_or(false, |product| product < n) {
        k += 1;
    }
    k
}

/// Distributes `num_clients` over `num_servers` slots.
///
/// Every slot starts at the rounded-up average. The fan-in is lowered by one as soon as the remaining clients fit
/// into the remaining slots at the lowered fan-in, so larger slots always come first. This tie-break decides the
/// generated client numbering and must not change.
pub(crate) fn partition(num_clients: usize, num_servers: usize) -> Vec<usize> {
    if num_servers == 0 {
        return Vec::new();
    }

    let mut fan_in = num_clients.div_ceil(num_servers);
    let mut remaining = num_clients;
    let mut fan_ins = Vec::with_capacity(num_servers);

    for i in 0..num_servers {
        fan_ins.push(fan_in);
        remaining = remaining.saturating_sub(fan_in);
        if remaining <= (num_servers - i - 1).saturating_mul(fan_in.saturating_sub(1)) {
            fan_in = fan_in.saturating_sub(1);
        }
    }

    fan_ins
}

/// Flit widths and scaling of the three layer tree, from the server side inwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayerWidths {
    flit_width_layer0: usize,
    scale_layer0: bool,
    flit_width_layer1: usize,
    scale_layer1: bool,
    scale_layer2: bool,
}

impl LayerWidths {
    fn new(scaling: ScalingFactor) -> Self {
        let factor = scaling.factor();
        let narrow = scaling.server_flit_width();
        let (flit_width_layer0, scale_layer0) = if factor < 8 { (narrow, false) } else { (32, true) };
        let (flit_width_layer1, scale_layer1) = if factor < 4 { (narrow, false) } else { (16, true) };
        Self { flit_width_layer0, scale_layer0, flit_width_layer1, scale_layer1, scale_layer2: factor >= 2 }
    }
}

fn wire_conn(layer: usize, index: usize, flit_width: usize) -> Connection {
    Connection::new(format!("smiWireReqL{}I{}", layer, index), format!("smiWireRespL{}I{}", layer, index), flit_width)
}

fn arbiter(name: String, flit_width: usize, scaled: bool, clients: Vec<Connection>, server: Connection) -> Arbiter {
    Arbiter {
        name,
        fifo_flit_depth: FIFO_FLIT_DEPTH,
        fifo_frame_depth: FIFO_FRAME_DEPTH,
        flit_width,
        tag_id_width: TAG_ID_WIDTH,
        scaled,
        clients,
        server,
    }
}

/// Adds a width scaler from `client` to `server`, or a direct assignment if `scale_factor` is 1.
fn scale_or_assign(config: &mut TreeConfig, name: String, scale_factor: usize, client: Connection, server: Connection) {
    if scale_factor > 1 {
        config.scalers.push(WidthScaler { name, scale_factor, base_flit_width: CLIENT_FLIT_WIDTH, client, server });
    } else {
        config.assignments.push(Assignment { client, server });
    }
}

fn single_client(module_name: &str, scaling: ScalingFactor) -> TreeConfig {
    let mut config = TreeConfig::new(module_name);

    let client = Connection::client(0);
    let server = Connection::server(scaling.server_flit_width());
    config.client_conns.push(client.clone());
    config.server_conns.push(server.clone());
    scale_or_assign(&mut config, "busWidthScaler".to_string(), scaling.factor(), client, server);

    config
}

fn single_arbiter(module_name: &str, num_clients: usize, scaling: ScalingFactor) -> TreeConfig {
    let mut config = TreeConfig::new(module_name);

    for i in 0..num_clients {
        let client = Connection::client(i);
        let wire = Connection::new(
            port_id_num("smiMemScaledReq", i),
            port_id_num("smiMemScaledResp", i),
            scaling.server_flit_width(),
        );
        config.client_conns.push(client.clone());
        config.wire_conns.push(wire.clone());
        scale_or_assign(&mut config, format!("busWidthScaler{}", i), scaling.factor(), client, wire);
    }

    let server = Connection::server(scaling.server_flit_width());
    config.arbiters.push(arbiter(
        "busArbiter".to_string(),
        scaling.server_flit_width(),
        false,
        config.wire_conns.clone(),
        server.clone(),
    ));
    config.server_conns.push(server);

    config
}

fn three_layer_tree(module_name: &str, num_clients: usize, scaling: ScalingFactor) -> TreeConfig {
    let mut config = TreeConfig::new(module_name);
    let fan_ins = FanIns::new(num_clients);
    let widths = LayerWidths::new(scaling);

    // Layer 0: the single arbiter driving the server connection.
    let server = Connection::server(scaling.server_flit_width());
    let layer0_wires =
        (0..fan_ins.layer0).map(|i| wire_conn(0, i, widths.flit_width_layer0)).collect::<Vec<_>>();
    config.wire_conns.extend(layer0_wires.iter().cloned());
    config.arbiters.push(arbiter(
        "busArbiterL0I0".to_string(),
        widths.flit_width_layer0,
        widths.scale_layer0,
        layer0_wires.clone(),
        server.clone(),
    ));
    config.server_conns.push(server);

    // Layer 1: one arbiter per layer-0 input.
    for (i, layer0_wire) in layer0_wires.into_iter().enumerate() {
        let layer1_wires = (0..fan_ins.layer1)
            .map(|j| wire_conn(1, i * fan_ins.layer1 + j, widths.flit_width_layer1))
            .collect::<Vec<_>>();
        config.arbiters.push(arbiter(
            format!("busArbiterL1I{}", i),
            widths.flit_width_layer1,
            widths.scale_layer1,
            layer1_wires.clone(),
            layer0_wire,
        ));
        config.wire_conns.extend(layer1_wires);
    }

    // Layer 2: one arbiter or scaler per layer-1 input, clients numbered in slot order.
    let mut client_index = 0;
    for (i, &fan_in) in fan_ins.layer2.iter().enumerate() {
        let layer1_wire = wire_conn(1, i, widths.flit_width_layer1);
        let clients = (client_index..client_index + fan_in).map(Connection::client).collect::<Vec<_>>();
        config.client_conns.extend(clients.iter().cloned());

        if let [client] = clients.as_slice() {
            let scale_factor = if widths.scale_layer2 { 2 } else { 1 };
            scale_or_assign(&mut config, format!("busWidthScalerL2I{}", i), scale_factor, client.clone(), layer1_wire);
        } else {
            config.arbiters.push(arbiter(
                format!("busArbiterL2I{}", i),
                CLIENT_FLIT_WIDTH,
                widths.scale_layer2,
                clients,
                layer1_wire,
            ));
        }

        client_index += fan_in;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_factor_conversions() {
        assert_eq!(ScalingFactor::try_from(4), Ok(ScalingFactor::X4));
        assert_eq!(ScalingFactor::try_from(3), Err(SynthError::InvalidScalingFactor(3)));
        assert_eq!(ScalingFactor::try_from(0), Err(SynthError::InvalidScalingFactor(0)));
        assert_eq!(ScalingFactor::from_axi_bus_width(512), Ok(ScalingFactor::X8));
        assert_eq!(ScalingFactor::from_axi_bus_width(32), Err(SynthError::InvalidAxiBusWidth(32)));
        assert_eq!(ScalingFactor::X2.server_flit_width(), 16);
    }

    #[test]
    fn module_name_convention() {
        assert_eq!(arbitration_tree_module_name(12, ScalingFactor::X4), "smiMemArbitrationTreeX12S4");
        assert_eq!(arbitration_tree_module_name(1, ScalingFactor::X1), "smiMemArbitrationTreeX1S1");
    }

    #[test]
    fn integer_roots_at_boundaries() {
        assert_eq!(ceil_cbrt(1), 1);
        assert_eq!(ceil_cbrt(8), 2);
        assert_eq!(ceil_cbrt(9), 3);
        assert_eq!(ceil_cbrt(27), 3);
        assert_eq!(ceil_cbrt(28), 4);
        assert_eq!(ceil_cbrt(64), 4);
        assert_eq!(ceil_sqrt_ratio(10, 3), 2);
        assert_eq!(ceil_sqrt_ratio(13, 3), 3);
        assert_eq!(ceil_sqrt_ratio(36, 4), 3);
        assert_eq!(ceil_sqrt_ratio(37, 4), 4);
    }

    #[test]
    fn fan_ins_for_ten_clients() {
        let fan_ins = FanIns::new(10);
        assert_eq!(fan_ins.layer0, 3);
        assert_eq!(fan_ins.layer1, 2);
        assert_eq!(fan_ins.num_servers(), 6);
        assert_eq!(fan_ins.layer2, vec![2, 2, 2, 2, 1, 1]);
    }

    #[test]
    fn partition_puts_larger_slots_first() {
        assert_eq!(partition(4, 4), vec![1, 1, 1, 1]);
        assert_eq!(partition(5, 4), vec![2, 1, 1, 1]);
        assert_eq!(partition(13, 9), vec![2, 2, 2, 2, 1, 1, 1, 1, 1]);
        assert_eq!(partition(28, 12), vec![3, 3, 3, 3, 2, 2, 2, 2, 2, 2, 2, 2]);
        assert_eq!(partition(49, 16)[..2], [4, 3]);
        assert_eq!(partition(64, 16), vec![4; 16]);
        assert!(partition(3, 0).is_empty());
    }

    #[test]
    fn layer2_fan_ins_are_balanced() {
        for num_clients in 4..=MAX_CLIENTS {
            let fan_ins = FanIns::new(num_clients);
            let layer2 = &fan_ins.layer2;

            assert_eq!(layer2.len(), fan_ins.num_servers());
            assert_eq!(layer2.iter().sum::<usize>(), num_clients);

            let max = *layer2.iter().max().unwrap();
            let min = *layer2.iter().min().unwrap();
            assert!(min >= 1, "{}: {:?}", num_clients, layer2);
            assert!(max - min <= 1, "{}: {:?}", num_clients, layer2);
            assert!(max <= 4, "{}: {:?}", num_clients, layer2);
            assert!(layer2.windows(2).all(|pair| pair[0] >= pair[1]), "{}: {:?}", num_clients, layer2);
        }
    }

    #[test]
    fn partition_matches_fan_ins() {
        for num_clients in 4..=MAX_CLIENTS {
            let fan_ins = FanIns::new(num_clients);
            assert_eq!(partition(num_clients, fan_ins.num_servers()), fan_ins.layer2);
        }
    }

    #[test]
    fn layer2_slots_match_fan_ins() {
        for num_clients in 4..=MAX_CLIENTS {
            let config = synthesize("m", num_clients, ScalingFactor::X2).unwrap();
            let fan_ins = FanIns::new(num_clients);

            let arbiters = config.arbiters.iter().filter(|arbiter| arbiter.name.starts_with("busArbiterL2I"));
            let num_single = fan_ins.layer2.iter().filter(|&&fan_in| fan_in == 1).count();
            assert_eq!(arbiters.count(), fan_ins.layer2.len() - num_single);
            assert_eq!(config.scalers.len(), num_single);
            assert_eq!(config.arbiters.len(), 1 + fan_ins.layer0 + fan_ins.layer2.len() - num_single);
        }
    }

    #[test]
    fn fan_in_arithmetic_does_not_overflow() {
        assert_eq!(ceil_cbrt(usize::MAX), 2_642_246);
        assert_eq!(ceil_sqrt_ratio(usize::MAX, 2_642_246), 2_642_246);
        assert_eq!(partition(usize::MAX, 2), vec![usize::MAX / 2 + 1, usize::MAX / 2]);
        assert_eq!(partition(usize::MAX, 1), vec![usize::MAX]);
        assert_eq!(ceil_cbrt(0), 1);
    }

    #[test]
    fn layer_widths() {
        let x1 = LayerWidths::new(ScalingFactor::X1);
        assert_eq!((x1.flit_width_layer0, x1.flit_width_layer1), (8, 8));
        assert!(!x1.scale_layer0 && !x1.scale_layer1 && !x1.scale_layer2);

        let x2 = LayerWidths::new(ScalingFactor::X2);
        assert_eq!((x2.flit_width_layer0, x2.flit_width_layer1), (16, 16));
        assert!(!x2.scale_layer0 && !x2.scale_layer1 && x2.scale_layer2);

        let x4 = LayerWidths::new(ScalingFactor::X4);
        assert_eq!((x4.flit_width_layer0, x4.flit_width_layer1), (32, 16));
        assert!(!x4.scale_layer0 && x4.scale_layer1 && x4.scale_layer2);

        let x8 = LayerWidths::new(ScalingFactor::X8);
        assert_eq!((x8.flit_width_layer0, x8.flit_width_layer1), (32, 16));
        assert!(x8.scale_layer0 && x8.scale_layer1 && x8.scale_layer2);
    }

    #[test]
    fn single_client_with_scaling() {
        let config = synthesize("m", 1, ScalingFactor::X8).unwrap();
        assert!(config.arbiters.is_empty());
        assert!(config.assignments.is_empty());
        assert_eq!(config.scalers.len(), 1);

        let scaler = &config.scalers[0];
        assert_eq!(scaler.name, "busWidthScaler");
        assert_eq!(scaler.scale_factor, 8);
        assert_eq!(scaler.base_flit_width, 8);
        assert_eq!(scaler.client.flit_width, 8);
        assert_eq!(scaler.server.flit_width, 64);
    }

    #[test]
    fn single_client_without_scaling() {
        let config = synthesize("m", 1, ScalingFactor::X1).unwrap();
        assert!(config.arbiters.is_empty());
        assert!(config.scalers.is_empty());
        assert_eq!(config.assignments, vec![Assignment { client: Connection::client(0), server: Connection::server(8) }]);
    }

    #[test]
    fn three_clients_without_scaling() {
        let config = synthesize("m", 3, ScalingFactor::X1).unwrap();
        assert_eq!(config.arbiters.len(), 1);
        assert!(config.scalers.is_empty());

        let arbiter = &config.arbiters[0];
        assert_eq!(arbiter.name, "busArbiter");
        assert_eq!(arbiter.fan_in(), 3);
        assert_eq!(arbiter.tag_id_width, 4);
        assert_eq!((arbiter.fifo_flit_depth, arbiter.fifo_frame_depth), (32, 4));
        assert!(!arbiter.scaled);

        assert_eq!(config.assignments.len(), 3);
        for (i, assignment) in config.assignments.iter().enumerate() {
            assert_eq!(assignment.client, Connection::client(i));
            assert_eq!(assignment.server, arbiter.clients[i]);
            assert_eq!(assignment.server.req_name, format!("smiMemScaledReq{}", i));
        }
    }

    #[test]
    fn two_clients_with_scaling() {
        let config = synthesize("m", 2, ScalingFactor::X4).unwrap();
        assert!(config.assignments.is_empty());
        assert_eq!(config.scalers.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), [
            "busWidthScaler0",
            "busWidthScaler1"
        ]);
        assert!(config.scalers.iter().all(|s| s.scale_factor == 4 && s.server.flit_width == 32));
        assert_eq!(config.arbiters[0].flit_width, 32);
        assert_eq!(config.arbiters[0].server, Connection::server(32));
    }

    #[test]
    fn ten_clients_tree() {
        let config = synthesize("m", 10, ScalingFactor::X2).unwrap();

        // 1 + 3 arbiters above the slots, 4 slots with two clients.
        assert_eq!(config.arbiters.len(), 8);
        assert_eq!(config.arbiters[0].name, "busArbiterL0I0");
        assert_eq!(config.arbiters[0].fan_in(), 3);
        assert!(config.arbiters[1..4].iter().all(|a| a.fan_in() == 2));
        assert_eq!(config.arbiters[4].name, "busArbiterL2I0");
        assert_eq!(config.arbiters[4].clients, vec![Connection::client(0), Connection::client(1)]);
        assert!(config.arbiters[4..].iter().all(|a| a.scaled && a.flit_width == 8));

        // Two single-client slots are scaled by 2.
        assert_eq!(config.scalers.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), [
            "busWidthScalerL2I4",
            "busWidthScalerL2I5"
        ]);
        assert_eq!(config.scalers[0].client, Connection::client(8));
        assert_eq!(config.scalers[1].server.req_name, "smiWireReqL1I5");
        assert!(config.scalers.iter().all(|s| s.scale_factor == 2 && s.server.flit_width == 16));

        // 3 layer-0 wires and 6 layer-1 wires.
        assert_eq!(config.wire_conns.len(), 9);
        assert_eq!(config.wire_conns[3].req_name, "smiWireReqL1I0");
        assert_eq!(config.arbiters[2].server.req_name, "smiWireReqL0I1");
        assert_eq!(config.arbiters[2].clients[1].req_name, "smiWireReqL1I3");
    }

    #[test]
    fn tree_without_scaling_uses_assignments() {
        let config = synthesize("m", 4, ScalingFactor::X1).unwrap();
        assert_eq!(config.arbiters.len(), 3);
        assert!(config.scalers.is_empty());
        assert_eq!(config.assignments.len(), 4);
        assert!(config.assignments.iter().all(|a| a.client.flit_width == 8 && a.server.flit_width == 8));
    }

    #[test]
    fn wide_tree_scales_at_every_layer() {
        let config = synthesize("m", 64, ScalingFactor::X8).unwrap();
        let root = &config.arbiters[0];
        assert!(root.scaled);
        assert_eq!(root.flit_width, 32);
        assert_eq!(root.server.flit_width, 64);
        assert_eq!(config.arbiters.len(), 1 + 4 + 16);
        assert!(config.scalers.is_empty());
        assert_eq!(config.client_conns.last(), Some(&Connection::client(63)));
    }

    #[test]
    fn invalid_client_counts() {
        for scaling in ScalingFactor::ALL {
            assert_eq!(synthesize("m", 0, scaling), Err(SynthError::InvalidClientCount(0)));
            assert_eq!(synthesize("m", 65, scaling), Err(SynthError::UnsupportedClientCount(65)));
        }
    }
}
