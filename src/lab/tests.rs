use super::*;
use crate::config::ArchConfig;

struct TestLab {
    arch: Arch,
    lab: u32,
    clocks: Vec<WireId>,
}

fn test_lab() -> TestLab {
    let mut arch = Arch::empty("test", 4, 4, &ArchConfig::default());
    let clocks = (0 .. 5)
        .map(|i| arch.add_wire(0, 0, &format!("GCLK{}", i), 0).unwrap())
        .collect();
    let input = arch.add_wire(1, 1, "LOCAL0", 0).unwrap();
    let lab = arch.create_lab(1, 1, &[input]).unwrap();
    TestLab { arch, lab, clocks }
}

fn ff_with_clock(clk: WireId) -> FfBinding {
    FfBinding {
        ctrlset: CtrlSet::new().with(CtrlCategory::Clk, ControlSig::new(clk)),
        datain: None,
        sdata: None,
    }
}

fn alm_with_clock(clk: WireId) -> AlmBinding {
    let mut binding = AlmBinding::default();
    binding.ffs[0] = Some(ff_with_clock(clk));
    binding
}

fn native_wire(ty: u8) -> WireId {
    WireId::from_pos(WirePos::new(ty, 0, 0, 0)).unwrap()
}

fn lut(nets: &[NetId], comb_out: Option<NetId>) -> LutBinding {
    LutBinding {
        inputs: nets.iter().map(|net| LutInput::new(*net)).collect(),
        comb_out,
        init: 0,
    }
}

#[test]
fn lab_construction() {
    let t = test_lab();
    let lab = t.arch.lab(t.lab).unwrap();

    assert_eq!(lab.alms.len(), ALMS_PER_LAB);
    assert_eq!(lab.ctrl_wires[CtrlCategory::Clk].len(), 3);
    assert_eq!(lab.ctrl_wires[CtrlCategory::Aclr].len(), 2);
    assert_eq!(lab.state, LabState::Tentative);
    assert_eq!(t.arch.lab_at(1, 1), Some(t.lab));

    let alm = &lab.alms[3];
    for &clk in &lab.ctrl_wires[CtrlCategory::Clk] {
        assert!(t.arch.wires_connected(clk, alm.sel_clk[0]));
        assert!(t.arch.wires_connected(clk, alm.sel_clk[1]));
    }
    assert!(t.arch.wires_connected(alm.comb_out[1], alm.ff_in[3]));
    assert!(!t.arch.wires_connected(alm.comb_out[0], alm.ff_in[3]));
    assert!(t.arch.wires_connected(alm.lut_in[AlmPin::E1.index()], alm.sel_ef[1]));

    let lut = t.arch.bel_by_name(1, 1, "ALM3_LUT1").unwrap();
    assert_eq!(t.arch.bel_pin_wire(lut, "E"), Some(alm.lut_in[AlmPin::E1.index()]));
    assert_eq!(t.arch.bel_pin_wire(lut, "A"), Some(alm.lut_in[AlmPin::A.index()]));
    assert_eq!(
        t.arch.bels.lab_data(lut),
        Some(crate::bels::LabBelData { lab: t.lab, alm: 3, idx: 1 })
    );

    let name = t.arch.wire_name(alm.sel_clk[0]).unwrap();
    assert_eq!(name, "WIRE.1.1.ALM3_CLKSEL0");
    assert_eq!(t.arch.wire_by_name(&name), Some(alm.sel_clk[0]));
}

#[test]
fn three_clocks_fit() {
    let mut t = test_lab();
    for alm in 0 .. 4 {
        let clk = t.clocks[alm.min(2) as usize];
        t.arch.propose(t.lab, alm, alm_with_clock(clk)).unwrap();
    }
    assert!(t.arch.check_legal(t.lab));
    assert!(t.arch.is_lab_ctrlset_legal(t.lab));
    t.arch.commit(t.lab).unwrap();
    assert_eq!(t.arch.lab(t.lab).unwrap().state, LabState::Confirmed);
}

#[test]
fn fourth_clock_overflows() {
    let mut t = test_lab();
    for alm in 0 .. 4 {
        t.arch.propose(t.lab, alm, alm_with_clock(t.clocks[alm as usize])).unwrap();
    }
    assert!(!t.arch.check_legal(t.lab));
    assert!(!t.arch.is_lab_ctrlset_legal(t.lab));
    /* The ALMs themselves are fine */
    assert!(t.arch.is_alm_legal(t.lab, 3));
    assert_eq!(
        t.arch.commit(t.lab),
        Err(LabError::CapacityExceeded { lab: t.lab, category: CtrlCategory::Clk })
    );
    assert_eq!(t.arch.lab(t.lab).unwrap().state, LabState::Tentative);

    /* Rebinding the offending ALM to a known clock restores legality */
    t.arch.propose(t.lab, 3, alm_with_clock(t.clocks[0])).unwrap();
    assert!(t.arch.check_legal(t.lab));
    t.arch.commit(t.lab).unwrap();
}

#[test]
fn shared_clock_counts_once() {
    let mut t = test_lab();
    for alm in 0 .. ALMS_PER_LAB as u8 {
        t.arch.propose(t.lab, alm, alm_with_clock(t.clocks[0])).unwrap();
    }
    assert!(t.arch.check_legal(t.lab));
    let usage = t.arch.lab(t.lab).unwrap().usage.clone().unwrap();
    assert_eq!(usage.signals[CtrlCategory::Clk].len(), 1);
}

#[test]
fn inverted_clock_is_another_signal() {
    let mut t = test_lab();
    let clk = t.clocks[0];
    let mut binding = alm_with_clock(clk);
    binding.ffs[2] = Some(FfBinding {
        ctrlset: CtrlSet::new().with(CtrlCategory::Clk, ControlSig::inverted(clk)),
        ..Default::default()
    });
    t.arch.propose(t.lab, 0, binding).unwrap();
    assert!(t.arch.check_legal(t.lab));
    let usage = t.arch.lab(t.lab).unwrap().usage.clone().unwrap();
    assert_eq!(usage.signals[CtrlCategory::Clk].len(), 2);
}

#[test]
fn sclr_capacity_is_one() {
    let mut t = test_lab();
    for alm in 0 .. 2u8 {
        let mut binding = alm_with_clock(t.clocks[0]);
        if let Some(ff) = binding.ffs[0].as_mut() {
            ff.ctrlset.set(CtrlCategory::Sclr, Some(ControlSig::new(t.clocks[1 + alm as usize])));
        }
        t.arch.propose(t.lab, alm, binding).unwrap();
    }
    assert!(!t.arch.check_legal(t.lab));
    assert_eq!(
        t.arch.lab(t.lab).unwrap().usage.as_ref().unwrap().overflow,
        Some(CtrlCategory::Sclr)
    );
}

#[test]
fn proposal_invalidates_cache() {
    let mut t = test_lab();
    t.arch.propose(t.lab, 0, alm_with_clock(t.clocks[0])).unwrap();
    t.arch.commit(t.lab).unwrap();
    assert!(t.arch.lab(t.lab).unwrap().ctrlset.is_some());

    t.arch.clear(t.lab, 0).unwrap();
    let lab = t.arch.lab(t.lab).unwrap();
    assert_eq!(lab.state, LabState::Tentative);
    assert!(lab.usage.is_none());
    assert!(lab.ctrlset.is_none());
    assert!(lab.alms[0].binding.is_empty());
}

#[test]
fn missing_lab_and_alm() {
    let mut t = test_lab();
    assert_eq!(
        t.arch.propose(t.lab, 10, AlmBinding::default()),
        Err(LabError::NoSuchAlm { lab: t.lab, alm: 10 })
    );
    assert_eq!(t.arch.propose(7, 0, AlmBinding::default()), Err(LabError::NoSuchLab(7)));
    assert!(!t.arch.check_legal(7));
    assert!(!t.arch.is_alm_legal(t.lab, 10));
    assert_eq!(t.arch.commit(7), Err(LabError::NoSuchLab(7)));
}

#[test]
fn control_set_assignment() {
    let mut t = test_lab();
    t.arch.propose(t.lab, 0, alm_with_clock(t.clocks[0])).unwrap();
    let mut binding = alm_with_clock(t.clocks[1]);
    binding.ffs[3] = Some(ff_with_clock(t.clocks[0]));
    t.arch.propose(t.lab, 1, binding).unwrap();
    t.arch.commit(t.lab).unwrap();

    let assignment = t.arch.lab(t.lab).unwrap().ctrlset.clone().unwrap();
    assert_eq!(
        assignment.signals[CtrlCategory::Clk],
        vec![ControlSig::new(t.clocks[0]), ControlSig::new(t.clocks[1])]
    );
    assert_eq!(assignment.alm_selects[0][0][CtrlCategory::Clk], Some(0));
    assert_eq!(assignment.alm_selects[1][0][CtrlCategory::Clk], Some(1));
    assert_eq!(assignment.alm_selects[1][1][CtrlCategory::Clk], Some(0));
    assert_eq!(assignment.alm_selects[2][0][CtrlCategory::Clk], None);
}

#[test]
fn half_ctrlset_mismatch() {
    let mut binding = alm_with_clock(native_wire(1));
    binding.ffs[1] = Some(ff_with_clock(native_wire(2)));
    assert!(!is_alm_binding_legal(&binding));

    /* Different halves may use different clocks */
    binding.ffs[1] = None;
    binding.ffs[2] = Some(ff_with_clock(native_wire(2)));
    assert!(is_alm_binding_legal(&binding));
}

#[test]
fn alm_input_budget() {
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(lut(&[1, 2, 3, 4, 5], Some(100)));
    binding.luts[1] = Some(lut(&[1, 2, 6, 7, 8], Some(101)));
    assert!(is_alm_binding_legal(&binding));

    binding.luts[1] = Some(lut(&[6, 7, 8, 9, 10], Some(101)));
    assert!(!is_alm_binding_legal(&binding));

    /* A 6-input LUT forces wide mode and its 6-net budget */
    binding.luts[0] = Some(lut(&[1, 2, 3, 4, 5, 6], Some(100)));
    binding.luts[1] = Some(lut(&[1, 2], Some(101)));
    assert!(binding.requires_wide());
    assert!(is_alm_binding_legal(&binding));
    binding.luts[1] = Some(lut(&[1, 7], Some(101)));
    assert!(!is_alm_binding_legal(&binding));

    binding.luts[0] = Some(lut(&[1, 2, 3, 4, 5, 6, 7], Some(100)));
    binding.luts[1] = None;
    assert!(!is_alm_binding_legal(&binding));
}

#[test]
fn ff_data_paths() {
    let clk = native_wire(1);
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(lut(&[1, 2, 3, 4, 5], Some(100)));
    binding.ffs[0] = Some(FfBinding { datain: Some(100), ..ff_with_clock(clk) });
    assert!(is_alm_binding_legal(&binding));

    /* Not driven by the LUT, and the LUT uses E */
    binding.ffs[1] = Some(FfBinding { datain: Some(200), ..ff_with_clock(clk) });
    assert!(!is_alm_binding_legal(&binding));

    /* With four inputs the E/F bypass is free */
    binding.luts[0] = Some(lut(&[1, 2, 3, 4], Some(100)));
    assert!(is_alm_binding_legal(&binding));

    /* Route-through of an empty half */
    binding.ffs[2] = Some(FfBinding { datain: Some(300), ..ff_with_clock(clk) });
    assert!(is_alm_binding_legal(&binding));

    /* sdata always takes the bypass */
    binding.luts[1] = Some(lut(&[5, 6, 7, 8, 9], Some(101)));
    binding.ffs[2] = Some(FfBinding { datain: Some(101), sdata: Some(400), ..ff_with_clock(clk) });
    assert!(!is_alm_binding_legal(&binding));
}

#[test]
fn check_all_on_threads() {
    let mut arch = Arch::empty("test", 8, 8, &ArchConfig::default());
    let clocks: Vec<WireId> = (0 .. 4)
        .map(|i| arch.add_wire(0, 0, &format!("GCLK{}", i), 0).unwrap())
        .collect();
    for x in 1 .. 6 {
        arch.create_lab(x, 1, &[]).unwrap();
    }
    for alm in 0 .. 4 {
        arch.propose(2, alm, alm_with_clock(clocks[alm as usize])).unwrap();
        arch.propose(4, alm, alm_with_clock(clocks[alm as usize])).unwrap();
    }

    assert_eq!(arch.check_all(3), vec![2, 4]);
    assert!(arch.labs.iter().all(|lab| lab.usage.is_some()));
    assert_eq!(arch.check_all(1), vec![2, 4]);
    assert!(arch.is_alm_legal(2, 0));
    assert!(!arch.is_lab_ctrlset_legal(4));
}

#[test]
fn bel_location_validity() {
    use crate::bels::{BelAux, BelId};

    let mut t = test_lab();
    for alm in 0 .. 4 {
        t.arch.propose(t.lab, alm, alm_with_clock(t.clocks[alm as usize])).unwrap();
    }
    let ff = t.arch.bel_by_name(1, 1, "ALM3_FF0").unwrap();
    let lut = t.arch.bel_by_name(1, 1, "ALM7_LUT1").unwrap();
    /* A fourth clock makes every bel of the LAB invalid, used or not */
    assert!(!t.arch.is_bel_location_valid(ff));
    assert!(!t.arch.is_bel_location_valid(lut));

    t.arch.propose(t.lab, 3, alm_with_clock(t.clocks[0])).unwrap();
    assert!(t.arch.is_bel_location_valid(ff));
    assert!(t.arch.is_bel_location_valid(lut));

    /* Both FFs of a half on different clocks only break their own ALM */
    let mut binding = alm_with_clock(t.clocks[0]);
    binding.ffs[1] = Some(ff_with_clock(t.clocks[1]));
    t.arch.propose(t.lab, 5, binding).unwrap();
    let bad = t.arch.bel_by_name(1, 1, "ALM5_FF1").unwrap();
    assert!(!t.arch.is_bel_location_valid(bad));
    assert!(t.arch.is_bel_location_valid(ff));

    let io = t.arch.add_bel(2, 2, "IO0", "MISTRAL_IO", BelAux::None).unwrap();
    assert!(t.arch.is_bel_location_valid(io));
    assert!(!t.arch.is_bel_location_valid(BelId { x: 3, y: 3, z: 9 }));
}

#[test]
fn bel_cell_type_match() {
    use crate::bels::{BelAux, BelId};
    use crate::pins::FF_CELL_TYPE;

    let mut t = test_lab();
    let lut = t.arch.bel_by_name(1, 1, "ALM0_LUT0").unwrap();
    let ff = t.arch.bel_by_name(1, 1, "ALM0_FF2").unwrap();
    let io = t.arch.add_bel(2, 2, "IO0", "MISTRAL_IO", BelAux::None).unwrap();

    assert!(is_comb_cell("MISTRAL_ALUT5"));
    assert!(is_comb_cell("MISTRAL_NOT"));
    assert!(!is_comb_cell(FF_CELL_TYPE));

    for cell_type in ["MISTRAL_ALUT6", "MISTRAL_ALUT2", "MISTRAL_BUF"] {
        assert!(t.arch.is_valid_bel_for_cell_type(cell_type, lut));
        assert!(!t.arch.is_valid_bel_for_cell_type(cell_type, ff));
    }
    assert!(t.arch.is_valid_bel_for_cell_type(FF_CELL_TYPE, ff));
    assert!(!t.arch.is_valid_bel_for_cell_type(FF_CELL_TYPE, lut));
    assert!(t.arch.is_valid_bel_for_cell_type("MISTRAL_IO", io));
    assert!(!t.arch.is_valid_bel_for_cell_type("MISTRAL_IO", lut));
    assert!(!t.arch.is_valid_bel_for_cell_type(FF_CELL_TYPE, BelId { x: 3, y: 3, z: 9 }));
}

/* -------------------------------------------------------------------------- */
/* Input reassignment                                                         */
/* -------------------------------------------------------------------------- */

fn restricted(net: NetId, pins: &[HalfPin]) -> LutInput {
    LutInput::restricted(net, HalfPinMask::of(pins))
}

#[test]
fn reassign_simple() {
    let mut t = test_lab();
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(lut(&[1, 2, 3], Some(100)));
    binding.luts[1] = Some(lut(&[3, 4], Some(101)));
    t.arch.propose(t.lab, 0, binding).unwrap();

    let map = t.arch.reassign_inputs(t.lab, 0).unwrap();
    /* One placement per input, nothing to undo */
    assert_eq!(map.attempts, 5);
    assert_eq!(map.luts[0].len(), 3);
    assert_eq!(map.luts[1].len(), 2);
    /* Net 3 is seen by both halves and has to sit on the same shared pin */
    let shared0 = map.physical_pin(0, 2, false).unwrap();
    let shared1 = map.physical_pin(1, 0, false).unwrap();
    assert_eq!(shared0, shared1);
    assert!(HalfPin::SHARED.iter().any(|pin| pin.physical(0, false) == shared0));
    assert_eq!(t.arch.alm(t.lab, 0).unwrap().pin_map.as_ref(), Some(&map));
}

#[test]
fn reassign_backtracks_over_shared_pins() {
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(LutBinding {
        inputs: vec![
            restricted(1, &[HalfPin::A, HalfPin::C]),
            restricted(2, &[HalfPin::B, HalfPin::C]),
            restricted(3, &[HalfPin::A, HalfPin::B]),
        ],
        comb_out: Some(100),
        init: 0,
    });

    let map = assign_alm_inputs(&binding).unwrap();
    /* Net 3 finds A and B taken, so net 2 moves over to C */
    assert_eq!(map.attempts, 4);
    assert_eq!(map.luts[0], vec![HalfPin::A, HalfPin::C, HalfPin::B]);
}

#[test]
fn reassign_backtracks_over_private_pins() {
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(LutBinding {
        inputs: vec![
            restricted(1, &[HalfPin::A, HalfPin::E]),
            restricted(2, &[HalfPin::E, HalfPin::F]),
            restricted(3, &[HalfPin::F]),
        ],
        comb_out: Some(100),
        init: 0,
    });

    let map = assign_alm_inputs(&binding).unwrap();
    assert_eq!(map.luts[0], vec![HalfPin::A, HalfPin::E, HalfPin::F]);
    assert!(map.attempts <= MAX_REASSIGN_ATTEMPTS);
}

#[test]
fn reassign_all_eight_pins() {
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(LutBinding {
        inputs: vec![
            LutInput::new(1),
            LutInput::new(2),
            LutInput::new(3),
            restricted(4, &[HalfPin::E]),
            restricted(5, &[HalfPin::F]),
        ],
        comb_out: Some(100),
        init: 0,
    });
    binding.luts[1] = Some(LutBinding {
        inputs: vec![
            LutInput::new(1),
            LutInput::new(2),
            LutInput::new(6),
            restricted(7, &[HalfPin::E]),
            restricted(8, &[HalfPin::F]),
        ],
        comb_out: Some(101),
        init: 0,
    });
    assert!(!binding.requires_wide());
    assert!(is_alm_binding_legal(&binding));

    let map = assign_alm_inputs(&binding).unwrap();
    let pins = |half: usize| -> Vec<AlmPin> {
        (0 .. 5).map(|input| map.physical_pin(half, input, false).unwrap()).collect()
    };
    assert_eq!(pins(0), vec![AlmPin::A, AlmPin::B, AlmPin::C, AlmPin::E0, AlmPin::F0]);
    assert_eq!(pins(1), vec![AlmPin::A, AlmPin::B, AlmPin::D, AlmPin::E1, AlmPin::F1]);

    /* Eight nets, every physical pin used exactly once */
    let mut used: Vec<AlmPin> = pins(0).into_iter().chain(pins(1)).collect();
    used.sort_by_key(|pin| pin.index());
    used.dedup();
    assert_eq!(used, AlmPin::ALL.to_vec());
}

#[test]
fn reassign_wide_e_conflict() {
    let mut binding = AlmBinding::default();
    binding.wide = true;
    binding.luts[0] = Some(LutBinding {
        inputs: vec![restricted(1, &[HalfPin::E])],
        ..Default::default()
    });
    binding.luts[1] = Some(LutBinding {
        inputs: vec![restricted(2, &[HalfPin::E])],
        ..Default::default()
    });
    assert_eq!(
        assign_alm_inputs(&binding),
        Err(ReassignError::Unresolvable { attempts: 1 })
    );

    /* Without wide mode every half has its own E */
    binding.wide = false;
    let map = assign_alm_inputs(&binding).unwrap();
    assert_eq!(map.physical_pin(0, 0, false), Some(AlmPin::E0));
    assert_eq!(map.physical_pin(1, 0, false), Some(AlmPin::E1));
}

#[test]
fn reassign_too_many_inputs() {
    let mut t = test_lab();
    let mut binding = AlmBinding::default();
    binding.luts[1] = Some(lut(&[1, 2, 3, 4, 5, 6, 7], None));
    t.arch.propose(t.lab, 2, binding).unwrap();
    assert_eq!(
        t.arch.reassign_inputs(t.lab, 2),
        Err(ReassignError::TooManyInputs { lut: 1, inputs: 7 })
    );
    assert!(t.arch.alm(t.lab, 2).unwrap().pin_map.is_none());
    assert_eq!(
        t.arch.reassign_inputs(t.lab, 11),
        Err(ReassignError::Lab(LabError::NoSuchAlm { lab: t.lab, alm: 11 }))
    );
}

#[test]
fn lut_mask_and() {
    let mut t = test_lab();
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(LutBinding {
        inputs: vec![restricted(1, &[HalfPin::A]), restricted(2, &[HalfPin::B])],
        comb_out: Some(100),
        init: 0b1000,
    });
    t.arch.propose(t.lab, 0, binding).unwrap();
    assert_eq!(t.arch.compute_lut_masks(t.lab, 0), Ok([0x8888_8888_8888_8888, 0]));
}

#[test]
fn lut_mask_swapped_inputs() {
    let mut t = test_lab();
    let mut binding = AlmBinding::default();
    binding.luts[0] = Some(LutBinding {
        inputs: vec![restricted(1, &[HalfPin::B]), restricted(2, &[HalfPin::A])],
        comb_out: Some(100),
        init: 0b0010,
    });
    t.arch.propose(t.lab, 0, binding).unwrap();
    assert_eq!(t.arch.compute_lut_masks(t.lab, 0), Ok([0x4444_4444_4444_4444, 0]));
}

#[test]
fn lut_mask_identity() {
    let pins = HalfPin::ALL.to_vec();
    assert_eq!(permute_lut_init(0x0123_4567_89ab_cdef, &pins), 0x0123_4567_89ab_cdef);
    assert_eq!(permute_lut_init(0b10, &[HalfPin::F]), 0xffff_ffff_0000_0000);
}
