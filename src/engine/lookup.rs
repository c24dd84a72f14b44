//! Database dispatch and the single-gadget leaf strategy.

use crate::chain::RopChain;
use crate::constraint::ConstraintClause;
use crate::database::GadgetDatabase;
use crate::engine::{ChainingEngine, SearchEnv};
use crate::error::FailType;
use crate::gadget::{Gadget, GadgetId};
use crate::query::{AssignArg, DestArg};

impl<D: GadgetDatabase> ChainingEngine<D> {
    /// Route a query to the matching database finder.
    ///
    /// Constant-address destinations have no finder and yield nothing, as do
    /// query shapes the database cannot express.
    pub(crate) fn lookup_raw(
        &self,
        dest: DestArg,
        assign: AssignArg,
        env: &SearchEnv,
        n: usize,
    ) -> Vec<GadgetId> {
        let (constraint, assertion) = (env.constraint(), env.assertion());

        match assign {
            AssignArg::Syscall => return self.db().find_syscall(constraint, assertion, n),
            AssignArg::Int80 => return self.db().find_int80(constraint, assertion, n),
            _ => {}
        }

        match (dest, assign) {
            (DestArg::Reg(reg), AssignArg::Cst(cst)) => {
                self.db().find_cst_to_reg(reg, cst, constraint, assertion, n)
            }
            (
                DestArg::Reg(reg),
                AssignArg::MemBinopCst {
                    addr_reg,
                    addr_op,
                    addr_cst,
                    cst,
                },
            ) => self.db().find_mem_binop_cst_to_reg(
                reg, addr_op, addr_reg, addr_cst, cst, constraint, assertion, n,
            ),
            (DestArg::Reg(reg), AssignArg::RegBinopCst { reg: src, op, cst }) => self
                .db()
                .find_reg_binop_cst_to_reg(reg, op, src, cst, constraint, assertion, n),
            (
                DestArg::Mem {
                    addr_reg,
                    addr_op,
                    addr_cst,
                },
                AssignArg::Cst(cst),
            ) => self
                .db()
                .find_cst_to_mem(addr_op, addr_reg, addr_cst, cst, constraint, assertion, n),
            (
                DestArg::Mem {
                    addr_reg,
                    addr_op,
                    addr_cst,
                },
                AssignArg::MemBinopCst {
                    addr_reg: src_addr_reg,
                    addr_op: src_addr_op,
                    addr_cst: src_addr_cst,
                    cst,
                },
            ) => self.db().find_mem_binop_cst_to_mem(
                addr_op,
                addr_reg,
                addr_cst,
                src_addr_op,
                src_addr_reg,
                src_addr_cst,
                cst,
                constraint,
                assertion,
                n,
            ),
            (
                DestArg::Mem {
                    addr_reg,
                    addr_op,
                    addr_cst,
                },
                AssignArg::RegBinopCst { reg: src, op, cst },
            ) => self.db().find_reg_binop_cst_to_mem(
                addr_op, addr_reg, addr_cst, op, src, cst, constraint, assertion, n,
            ),
            _ => Vec::new(),
        }
    }

    /// Leaf strategy: satisfy the query with a single gadget, padding its
    /// stack consumption unless padding is disabled.
    pub(crate) fn basic_db_lookup(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        if env.lmax() == 0 {
            env.fail_max_len();
            return None;
        }

        let saved_constraint = env.constraint().clone();
        let octets = self.arch().octets();

        if !env.no_padding() {
            // Gadgets eating more stack than the budget can never fit.
            let max_sp_inc = (env.lmax() * octets) as i64;
            env.constraint_mut()
                .add(ConstraintClause::MaxSpInc(max_sp_inc));
        }

        // A query targeting the instruction pointer ends the chain there, so
        // any terminator is acceptable.
        if dest == DestArg::Reg(self.arch().ip()) {
            env.constraint_mut().update(ConstraintClause::Return {
                ret: true,
                jmp: true,
                call: true,
            });
        }

        let gadgets = self.lookup_raw(dest, assign, env, 1);

        let res = match gadgets.first() {
            None => {
                env.set_last_fail(FailType::NoGadget);
                None
            }
            Some(id) => {
                let mut chain = RopChain::new();
                chain.add_gadget(*id);
                if env.no_padding() {
                    Some(chain)
                } else {
                    match env.constraint().valid_padding(self.arch()) {
                        Some(word) => {
                            let words = self
                                .db()
                                .get(*id)
                                .and_then(Gadget::sp_inc)
                                .map(|inc| (inc / octets as i64 - 1).max(0) as usize)
                                .unwrap_or(0);
                            chain.add_padding(word, words);
                            Some(chain)
                        }
                        None => {
                            env.fail_record_mut().set_no_valid_padding(true);
                            env.set_last_fail(FailType::NoValidPadding);
                            None
                        }
                    }
                }
            }
        };

        env.set_constraint(saved_constraint);
        res
    }
}
