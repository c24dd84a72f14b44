use ropforge::prelude::*;

const R0: RegId = 0;
const R1: RegId = 1;
const R2: RegId = 2;
const SP: RegId = 3;
const IP: RegId = 4;

fn toy_arch() -> Arch {
    Arch::new("toy", 5, 8, SP, IP)
}

fn pop_into(reg: RegId, asm: &str, addr: Addr) -> (Gadget, (DestArg, AssignArg)) {
    (
        Gadget::new(asm)
            .with_sp_inc(16)
            .with_modified([reg])
            .with_addresses([addr]),
        (
            DestArg::Reg(reg),
            AssignArg::MemBinopCst {
                addr_reg: SP,
                addr_op: Binop::Add,
                addr_cst: 0,
                cst: 0,
            },
        ),
    )
}

fn mov(dest: RegId, src: RegId, asm: &str, addr: Addr) -> (Gadget, (DestArg, AssignArg)) {
    (
        Gadget::new(asm)
            .with_sp_inc(8)
            .with_modified([dest])
            .with_addresses([addr]),
        (
            DestArg::Reg(dest),
            AssignArg::RegBinopCst {
                reg: src,
                op: Binop::Add,
                cst: 0,
            },
        ),
    )
}

fn engine_with<I>(gadgets: I) -> ChainingEngine<MemoryDatabase>
where
    I: IntoIterator<Item = (Gadget, (DestArg, AssignArg))>,
{
    let mut db = MemoryDatabase::new(toy_arch());
    for (gadget, effect) in gadgets {
        db.insert(gadget, [effect]);
    }
    ChainingEngine::new(toy_arch(), db)
}

#[test]
fn direct_pop_loads_constant() {
    let mut engine = engine_with([pop_into(R0, "pop r0; ret", 0x400)]);

    let chain = engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3),
        )
        .expect("pop chain expected");

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.gadgets().collect::<Vec<_>>(), vec![0]);
    assert_eq!(
        chain.items()[1],
        ChainItem::Padding {
            value: 0x41,
            comment: Some("Constant: 0x41".into()),
        }
    );
}

#[test]
fn bad_byte_in_constant_blocks_the_pop() {
    let mut engine = engine_with([pop_into(R0, "pop r0; ret", 0x400)]);

    let err = engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3).with_bad_bytes([0x41]),
        )
        .expect_err("the constant itself carries the bad byte");

    let record = err.fail_record().expect("search ran");
    assert_eq!(record.modified_regs().count(), 0);
    assert!(record.bad_bytes().any(|b| b == 0x41));
}

#[test]
fn single_gadget_register_move() {
    let mut engine = engine_with([mov(R1, R0, "mov r1, r0; ret", 0x401)]);

    let chain = engine
        .search(
            DestArg::Reg(R1),
            AssignArg::RegBinopCst {
                reg: R0,
                op: Binop::Add,
                cst: 0,
            },
            &SearchParams::new().with_lmax(2),
        )
        .expect("direct move expected");

    assert_eq!(chain.len(), 1);
    assert_eq!(chain.gadgets().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn transitivity_chains_two_moves() {
    let mut engine = engine_with([
        mov(R1, R0, "mov r1, r0; ret", 0x401),
        mov(R2, R1, "mov r2, r1; ret", 0x402),
    ]);

    let chain = engine
        .search(
            DestArg::Reg(R2),
            AssignArg::RegBinopCst {
                reg: R0,
                op: Binop::Add,
                cst: 0,
            },
            &SearchParams::new().with_lmax(4),
        )
        .expect("two-move chain expected");

    assert_eq!(chain.len(), 2);
    // r1 <- r0 first, then r2 <- r1.
    assert_eq!(chain.gadgets().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn shortest_mode_beats_the_first_hit() {
    let direct = (
        Gadget::new("xor r2, r2; add r2, 0x42; ret")
            .with_sp_inc(32)
            .with_modified([R2])
            .with_addresses([0x600]),
        (DestArg::Reg(R2), AssignArg::Cst(0x42)),
    );
    let pop = pop_into(R2, "pop r2; ret", 0x601);

    let query = (DestArg::Reg(R2), AssignArg::Cst(0x42));

    let mut first_hit = engine_with([direct.clone(), pop.clone()]);
    let long = first_hit
        .search(query.0, query.1, &SearchParams::new().with_lmax(10))
        .expect("first hit expected");
    assert_eq!(long.len(), 4);

    let mut shortest = engine_with([direct, pop]);
    let short = shortest
        .search(
            query.0,
            query.1,
            &SearchParams::new().with_lmax(10).with_shortest(true),
        )
        .expect("shortest chain expected");
    assert_eq!(short.len(), 2);
    assert_eq!(short.gadgets().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn memory_write_through_intermediate_register() {
    let store = (
        Gadget::new("mov [r1], r0; ret")
            .with_sp_inc(8)
            .with_addresses([0x700]),
        (
            DestArg::Mem {
                addr_reg: R1,
                addr_op: Binop::Add,
                addr_cst: 0,
            },
            AssignArg::RegBinopCst {
                reg: R0,
                op: Binop::Add,
                cst: 0,
            },
        ),
    );
    let mut engine = engine_with([store, pop_into(R0, "pop r0; ret", 0x701)]);

    let chain = engine
        .search(
            DestArg::Mem {
                addr_reg: R1,
                addr_op: Binop::Add,
                addr_cst: 0,
            },
            AssignArg::Cst(0x1337),
            &SearchParams::new().with_lmax(5),
        )
        .expect("store chain expected");

    // Load the value first, then store it: pop r0 / constant / store.
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.gadgets().collect::<Vec<_>>(), vec![1, 0]);
    assert_eq!(
        chain.items()[1],
        ChainItem::Padding {
            value: 0x1337,
            comment: Some("Constant: 0x1337".into()),
        }
    );
}

#[test]
fn kept_registers_exclude_clobbering_gadgets() {
    let clobbering_pop = (
        Gadget::new("pop r0; xor r2, r2; ret")
            .with_sp_inc(16)
            .with_modified([R0, R2])
            .with_addresses([0x800]),
        (
            DestArg::Reg(R0),
            AssignArg::MemBinopCst {
                addr_reg: SP,
                addr_op: Binop::Add,
                addr_cst: 0,
                cst: 0,
            },
        ),
    );

    let mut engine = engine_with([clobbering_pop.clone()]);
    assert!(engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3),
        )
        .is_ok());

    let mut engine = engine_with([clobbering_pop]);
    assert!(engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3).with_keep_regs([R2]),
        )
        .is_err());
}

#[test]
fn exhausted_budget_reports_max_len() {
    let mut engine = engine_with([pop_into(R0, "pop r0; ret", 0x400)]);

    let err = engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(1),
        )
        .expect_err("a pop chain needs two words");

    assert!(err.fail_record().expect("search ran").max_len());
}

#[test]
fn depth_bound_disables_chaining_but_not_leaf_lookups() {
    let gadgets = [
        mov(R1, R0, "mov r1, r0; ret", 0x401),
        mov(R2, R1, "mov r2, r1; ret", 0x402),
    ];
    let shallow = SearchParams::new().with_lmax(4).with_max_depth(0);

    // The direct move still resolves at depth one.
    let mut engine = engine_with(gadgets.clone());
    assert!(engine
        .search(
            DestArg::Reg(R1),
            AssignArg::RegBinopCst {
                reg: R0,
                op: Binop::Add,
                cst: 0,
            },
            &shallow,
        )
        .is_ok());

    // The transitive one needs a sub-search, which the bound forbids.
    let mut engine = engine_with(gadgets);
    assert!(engine
        .search(
            DestArg::Reg(R2),
            AssignArg::RegBinopCst {
                reg: R0,
                op: Binop::Add,
                cst: 0,
            },
            &shallow,
        )
        .is_err());
}

#[test]
fn invalid_length_budgets_are_rejected() {
    let mut engine = engine_with([]);
    for lmax in [0, 40_000, 100_000] {
        let res = engine.search(
            DestArg::Reg(R0),
            AssignArg::Cst(0),
            &SearchParams::new().with_lmax(lmax),
        );
        assert_eq!(res, Err(SearchError::InvalidLength(lmax)));
    }
}

#[test]
fn failed_moves_are_memoized_until_reset() {
    let mut engine = engine_with([]);
    let err = engine.search(
        DestArg::Reg(R2),
        AssignArg::RegBinopCst {
            reg: R0,
            op: Binop::Add,
            cst: 0,
        },
        &SearchParams::new().with_lmax(4),
    );
    assert!(err.is_err());

    // The top-level query failed under the plain ret-only constraint.
    let mut constraint = Constraint::new();
    constraint.add(ConstraintClause::Return {
        ret: true,
        jmp: false,
        call: false,
    });
    let sig = constraint.signature();
    assert!(engine
        .transitivity_record()
        .is_impossible(R2, R0, Binop::Add, 0, sig));

    engine.reset_records();
    assert!(!engine
        .transitivity_record()
        .is_impossible(R2, R0, Binop::Add, 0, sig));
}

#[test]
fn rendering_resolves_gadgets_and_comments() {
    let mut engine = engine_with([pop_into(R0, "pop r0; ret", 0x400)]);

    let chain = engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3),
        )
        .expect("pop chain expected");

    let listing = chain.render(engine.db(), engine.arch(), &Constraint::new());
    assert!(listing.contains("pop r0; ret"));
    assert!(listing.contains("0x0000000000000400"));
    assert!(listing.contains("Constant: 0x41"));
}

#[test]
fn rendering_skips_addresses_with_bad_bytes() {
    // The first address carries the bad byte; only the second may appear in
    // the listing.
    let pop = (
        Gadget::new("pop r0; ret")
            .with_sp_inc(16)
            .with_modified([R0])
            .with_addresses([0x4200, 0x9100]),
        (
            DestArg::Reg(R0),
            AssignArg::MemBinopCst {
                addr_reg: SP,
                addr_op: Binop::Add,
                addr_cst: 0,
                cst: 0,
            },
        ),
    );
    let mut engine = engine_with([pop]);

    let chain = engine
        .search(
            DestArg::Reg(R0),
            AssignArg::Cst(0x41),
            &SearchParams::new().with_lmax(3).with_bad_bytes([0x42]),
        )
        .expect("the second address is clean");

    let mut constraint = Constraint::new();
    constraint.add(ConstraintClause::BadBytes(vec![0x42]));
    let listing = chain.render(engine.db(), engine.arch(), &constraint);
    assert!(listing.contains("0x0000000000009100"));
    assert!(!listing.contains("0x0000000000004200"));
}
