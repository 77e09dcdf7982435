use ebcvm::{encode_instruction, Arguments, Instruction, Machine, Opcode, Register, Width};

const MEMORY_SIZE : usize = 0x1000;
const STACK_TOP   : u64   = 0x1000;
const DATA        : u64   = 0x800;

fn generic(
  opcode   : Opcode,
  operand1 : Register,
  operand2 : Register,
  indirect : bool,
  imm      : Option<u32>
) -> Instruction {
  Instruction {
    opcode,
    operand1,
    op1_indirect : false,
    operand2,
    op2_indirect : indirect,
    arguments    : Arguments::Generic { is_64op: true, imm }
  }
}

fn main() {

  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  // Sums the two quad words at DATA and DATA + 8, keeps a copy of the first one, and pushes
  // the sum.
  let program = [
    // R1 <- [R2], R2 holds DATA
    Instruction {
      opcode       : Opcode::MovQQ,
      operand1     : Register::R1,
      op1_indirect : false,
      operand2     : Register::R2,
      op2_indirect : true,
      arguments    : Arguments::Move {
        op_len  : Width::Quad,
        idx_len : Width::Quad,
        op1_idx : None,
        op2_idx : None
      }
    },
    // R1 <- R1 + [R2 + 1 natural unit]
    generic(Opcode::Add, Register::R1, Register::R2, true, Some(0x1001)),
    // R3 <- R3 + R1
    generic(Opcode::Add, Register::R3, Register::R1, false, None),
    generic(Opcode::Push, Register::R3, Register::R0, false, None),
    generic(Opcode::Ret, Register::R0, Register::R0, false, None),
  ];

  let mut machine = Machine::new(MEMORY_SIZE);
  let mut address = 0u64;
  for instruction in program.iter() {
    let bytes = encode_instruction(instruction);
    println!("{:#06x}  {:<24}{}", address, format!("{:02x?}", bytes), instruction);
    if let Err(e) = machine.load(address, &bytes) {
      eprintln!("Error: {}", e);
      std::process::exit(1);
    }
    address += bytes.len() as u64;
  }

  let data = [40u64.to_le_bytes(), 2u64.to_le_bytes()].concat();
  if let Err(e) = machine.load(DATA, &data) {
    eprintln!("Error: {}", e);
    std::process::exit(1);
  }
  machine.set_register(Register::R0, STACK_TOP);
  machine.set_register(Register::R2, DATA);

  match machine.run(None) {
    Ok(executed) => {
      println!("Executed {} instructions.", executed);
      println!("{}", machine);
    }
    Err(e) => {
      eprintln!("Error: {}", e);
      println!("{}", machine);
      std::process::exit(1);
    }
  }

}
