//! Adjust-ret strategy: use a jmp/call-terminated gadget by first seeding its
//! pivot register with the address of a return-like gadget, so control flows
//! back to the stack after the useful work.

use crate::arch::Cst;
use crate::chain::RopChain;
use crate::consts::*;
use crate::constraint::ConstraintClause;
use crate::database::GadgetDatabase;
use crate::engine::{ChainingEngine, SearchEnv, Strategy};
use crate::error::FailType;
use crate::gadget::RetType;
use crate::query::{AssignArg, Binop, DestArg};

impl<D: GadgetDatabase> ChainingEngine<D> {
    pub(crate) fn chain_adjust_ret(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        if env.calls_count(Strategy::AdjustRet) > 2 {
            env.set_last_fail(FailType::Other);
            return None;
        }
        // The pivot trick cannot target the registers that drive the chain
        // itself.
        if let DestArg::Reg(reg) = dest {
            if reg == self.arch().ip() || reg == self.arch().sp() {
                env.set_last_fail(FailType::Other);
                return None;
            }
        }

        env.add_call(Strategy::AdjustRet);

        let prev_lmax = env.lmax();
        let octets = self.arch().octets() as i64;
        let saved_constraint = env.constraint().clone();

        // 1. Candidates matching the semantics but ending in jmp/call.
        env.constraint_mut().update(ConstraintClause::Return {
            ret: false,
            jmp: true,
            call: true,
        });
        env.constraint_mut()
            .add(ConstraintClause::MaxSpInc(prev_lmax as i64 * octets));
        let possible = self.lookup_raw(dest, assign, env, ADJUST_RET_MAX_POSSIBLE_GADGETS);
        env.set_constraint(saved_constraint.clone());

        let mut res = None;

        'candidates: for id in possible {
            let Some(gadget) = self.db().get(id) else {
                continue;
            };
            let Some(ret_reg) = gadget.ret_reg() else {
                continue;
            };
            if env.adjust_ret_record().is_impossible(ret_reg) || env.constraint().keep_reg(ret_reg)
            {
                continue;
            }
            if gadget.modifies(ret_reg) {
                // A pivot clobbered by its own gadget cannot be seeded.
                env.fail_record_mut().add_modified_reg(ret_reg);
                continue;
            }
            let Some(sp_inc) = gadget.sp_inc() else {
                continue;
            };
            let ret_type = gadget.ret_type();

            // Stack arithmetic: where the adjustment gadget must resume, and
            // how much filler the candidate consumes.
            let (offset, padding_len) = if sp_inc < 0 {
                (-sp_inc, 0usize)
            } else {
                let padding = (sp_inc / octets) as usize;
                // A call pushes a return address, consuming one slot.
                let offset = match ret_type {
                    RetType::Call if self.arch().call_pushes_return() => octets,
                    RetType::Ret | RetType::Jmp | RetType::Call => 0,
                };
                (offset, padding)
            };

            // 2. Return-like gadgets resuming at sp + offset, which must not
            // undo the candidate's work.
            if let DestArg::Reg(reg) = dest {
                env.constraint_mut()
                    .add(ConstraintClause::KeepRegs(vec![reg]));
            }
            let adjust_gadgets = self.lookup_raw(
                DestArg::Reg(self.arch().ip()),
                AssignArg::MemBinopCst {
                    addr_reg: self.arch().sp(),
                    addr_op: Binop::Add,
                    addr_cst: offset,
                    cst: 0,
                },
                env,
                ADJUST_RET_MAX_ADJUST_GADGETS,
            );
            env.set_constraint(saved_constraint.clone());

            if padding_len + 1 >= prev_lmax {
                continue;
            }

            // 3. Seed the pivot register with an adjustment gadget address.
            for adjust_id in &adjust_gadgets {
                let Some(adjust) = self.db().get(*adjust_id) else {
                    continue;
                };
                let asm = adjust.asm().to_string();
                let addresses: Vec<_> = adjust
                    .addresses()
                    .iter()
                    .copied()
                    .take(ADJUST_RET_MAX_ADDRESS_TRY)
                    .collect();

                for addr in addresses {
                    // The seeding chain must not clobber the value about to
                    // be assigned.
                    match assign {
                        AssignArg::RegBinopCst { reg, .. } => env
                            .constraint_mut()
                            .add(ConstraintClause::KeepRegs(vec![reg])),
                        AssignArg::MemBinopCst { addr_reg, .. } => env
                            .constraint_mut()
                            .add(ConstraintClause::KeepRegs(vec![addr_reg])),
                        _ => {}
                    }
                    env.set_lmax(prev_lmax - padding_len - 1);
                    env.push_comment(Strategy::PopConstant, format!("Address of {asm}"));

                    let seed = self.search_inner(
                        DestArg::Reg(ret_reg),
                        AssignArg::Cst(addr as Cst),
                        env,
                        false,
                    );

                    env.set_constraint(saved_constraint.clone());
                    env.set_lmax(prev_lmax);
                    env.pop_comment(Strategy::PopConstant);

                    let Some(seed) = seed else {
                        continue;
                    };

                    // 4. Assemble: seeding chain, candidate, filler.
                    match env.constraint().valid_padding(self.arch()) {
                        Some(word) => {
                            let mut chain = seed;
                            chain.add_gadget(id);
                            chain.add_padding(word, padding_len);
                            res = Some(chain);
                        }
                        None => {
                            env.fail_record_mut().set_no_valid_padding(true);
                        }
                    }
                    break 'candidates;
                }
            }

            // Every address of every adjustment gadget failed: this pivot is
            // a dead end for the rest of the search.
            if !adjust_gadgets.is_empty() {
                tracing::trace!(ret_reg, "pivot register recorded un-adjustable");
                env.adjust_ret_record_mut().add_fail(ret_reg);
            }
        }

        env.remove_last_call();
        res
    }
}
