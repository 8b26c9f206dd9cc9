//! Actions that need the translation context: control flow, kills, resources and geometry
//! emission. Bound in every flavor.

use super::{Action, ActionTable, Emit, Fetch, FlowOp, SampleLod, TexOp};
use crate::opcode::Opcode;

const SRC0_X: &[(u8, u8)] = &[(0, 0)];
const SRC0_XYZW: &[(u8, u8)] = &[(0, 0), (0, 1), (0, 2), (0, 3)];

pub(super) fn install(table: &mut ActionTable) {
    use Opcode::*;

    let flow = [
        (If, FlowOp::If),
        (Uif, FlowOp::Uif),
        (Switch, FlowOp::Switch),
        (Case, FlowOp::Case),
    ];
    for (opcode, op) in flow {
        table.set(opcode, Action::new(Fetch::Channels(SRC0_X), Emit::Flow(op)));
    }
    let flow = [
        (Else, FlowOp::Else),
        (EndIf, FlowOp::EndIf),
        (BgnLoop, FlowOp::BgnLoop),
        (EndLoop, FlowOp::EndLoop),
        (Brk, FlowOp::Brk),
        (Cont, FlowOp::Cont),
        (Default, FlowOp::Default),
        (EndSwitch, FlowOp::EndSwitch),
        (Cal, FlowOp::Cal),
        (Ret, FlowOp::Ret),
        (BgnSub, FlowOp::BgnSub),
        (EndSub, FlowOp::EndSub),
    ];
    for (opcode, op) in flow {
        table.set(opcode, Action::new(Fetch::None, Emit::Flow(op)));
    }

    table.set(Nop, Action::new(Fetch::None, Emit::Nop));
    table.set(End, Action::new(Fetch::None, Emit::End));
    table.set(Kill, Action::new(Fetch::None, Emit::Kill));
    table.set(KillIf, Action::new(Fetch::Channels(SRC0_XYZW), Emit::KillIf));
    // The stream operand is read from the immediate table, not fetched per lane.
    table.set(EmitVertex, Action::new(Fetch::None, Emit::EmitVertex));
    table.set(EndPrimitive, Action::new(Fetch::None, Emit::EndPrimitive));

    let texture = [
        (Tex, TexOp::Sample(SampleLod::Implicit)),
        (Txb, TexOp::Sample(SampleLod::Bias)),
        (Txl, TexOp::Sample(SampleLod::Explicit)),
        (Txp, TexOp::Sample(SampleLod::Projected)),
        (Txf, TexOp::Fetch),
        (Txq, TexOp::Size),
    ];
    for (opcode, op) in texture {
        table.set(opcode, Action::new(Fetch::Channels(SRC0_XYZW), Emit::Texture(op)));
    }
    table.set(Load, Action::new(Fetch::None, Emit::Load));
    table.set(Store, Action::new(Fetch::None, Emit::Store));
}
