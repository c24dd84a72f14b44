//! Pop-constant strategy: load an immediate into a register through a
//! stack-load gadget, placing the constant on the stack as padding.

use crate::arch::{Addr, Word};
use crate::chain::RopChain;
use crate::constraint::ConstraintClause;
use crate::database::GadgetDatabase;
use crate::engine::{ChainingEngine, SearchEnv, Strategy};
use crate::error::FailType;
use crate::gadget::Gadget;
use crate::query::{AssignArg, Binop, DestArg};

impl<D: GadgetDatabase> ChainingEngine<D> {
    /// Satisfy `dest <- cst` with a gadget doing `dest <- mem[sp + offset]`,
    /// scanning offsets until one fits the length budget.
    pub(crate) fn chain_pop_constant(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        let DestArg::Reg(dest_reg) = dest else {
            return None;
        };
        let AssignArg::Cst(cst) = assign else {
            return None;
        };

        let octets = self.arch().octets();

        // The constant lands on the stack verbatim; forbidden bytes in its
        // encoding rule the whole strategy out.
        if !env.constraint().verify_address(cst as Addr, self.arch()) {
            for byte in (cst as Addr).to_le_bytes().iter().take(octets) {
                if env.constraint().is_bad_byte(*byte) {
                    env.fail_record_mut().add_bad_byte(*byte);
                }
            }
            env.set_last_fail(FailType::Other);
            return None;
        }

        env.add_call(Strategy::PopConstant);
        let prev_no_padding = env.no_padding();
        env.set_no_padding(true);

        let taken_comment = env.pop_comment(Strategy::PopConstant);
        let comment = taken_comment
            .clone()
            .unwrap_or_else(|| format!("Constant: {cst:#x}"));

        let saved_constraint = env.constraint().clone();
        let limit = (env.lmax() * octets) as i64;
        let mut res = None;
        let mut offset: i64 = 0;

        while offset < limit {
            // The gadget must consume past the loaded slot and still leave a
            // word for the next return; a pop rax; jmp rax would match the
            // load semantics but dead-end the chain.
            let min_inc = offset
                + if dest_reg == self.arch().ip() {
                    octets as i64
                } else {
                    2 * octets as i64
                };
            env.set_constraint(saved_constraint.clone());
            env.constraint_mut().add(ConstraintClause::MinSpInc(min_inc));
            env.constraint_mut().add(ConstraintClause::MaxSpInc(limit));

            let pop = self.basic_db_lookup(
                dest,
                AssignArg::MemBinopCst {
                    addr_reg: self.arch().sp(),
                    addr_op: Binop::Add,
                    addr_cst: offset,
                    cst: 0,
                },
                env,
            );

            if let Some(mut chain) = pop {
                match env.constraint().valid_padding(self.arch()) {
                    Some(word) => {
                        chain.add_padding(word, offset as usize / octets);
                        chain.add_padding_with_comment(cst as Word, comment.clone());
                        // Everything the gadget consumes beyond the constant
                        // slot and the next return slot is filler.
                        let sp_inc = chain
                            .gadgets()
                            .next()
                            .and_then(|id| self.db().get(id))
                            .and_then(Gadget::sp_inc)
                            .unwrap_or(0);
                        let tail = (sp_inc - offset - 2 * octets as i64).max(0) as usize / octets;
                        chain.add_padding(word, tail);
                        res = Some(chain);
                    }
                    None => {
                        env.fail_record_mut().set_no_valid_padding(true);
                        env.set_last_fail(FailType::NoValidPadding);
                    }
                }
                break;
            }

            offset += octets as i64;
        }

        env.set_constraint(saved_constraint);
        env.set_no_padding(prev_no_padding);
        env.remove_last_call();
        if let Some(text) = taken_comment {
            env.push_comment(Strategy::PopConstant, text);
        }

        res
    }
}
