//! Shared fixtures for integration tests.
//!
//! `ClassAssembler` writes minimal but valid class files so the reader can be
//! tested without a Java compiler. Class and member names are given in
//! internal (slash-separated) form.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use mutcheck::analysis::{AccessFlags, ClassBuilder, ClassFacts, Instruction, MethodBuilder};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

pub mod op {
    pub const ALOAD_0: u8 = 0x2a;
    pub const ALOAD_1: u8 = 0x2b;
    pub const ILOAD_1: u8 = 0x1b;
    pub const ICONST_0: u8 = 0x03;
    pub const IFEQ: u8 = 0x99;
    pub const GOTO: u8 = 0xa7;
    pub const RETURN: u8 = 0xb1;
    pub const IRETURN: u8 = 0xac;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const ARETURN: u8 = 0xb0;
    pub const NEW: u8 = 0xbb;
    pub const DUP: u8 = 0x59;
    pub const POP: u8 = 0x57;
}

/// Two big-endian bytes of a constant-pool index or branch offset.
pub fn u16_bytes(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

struct MemberInfo {
    access: u16,
    name: u16,
    descriptor: u16,
    code: Option<CodeInfo>,
}

struct CodeInfo {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
}

pub struct ClassAssembler {
    pool: Vec<u8>,
    pool_count: u16,
    utf8_cache: HashMap<String, u16>,
    access: u16,
    this_class: u16,
    super_class: u16,
    fields: Vec<MemberInfo>,
    methods: Vec<MemberInfo>,
    bootstrap_methods: Vec<u16>,
}

impl ClassAssembler {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut asm = Self {
            pool: Vec::new(),
            pool_count: 1,
            utf8_cache: HashMap::new(),
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        };
        asm.this_class = asm.class(name);
        asm.super_class = asm.class(super_name);
        asm
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access | ACC_SUPER;
        self
    }

    fn push_entry(&mut self, bytes: &[u8]) -> u16 {
        self.pool.extend_from_slice(bytes);
        let index = self.pool_count;
        self.pool_count += 1;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8_cache.get(value) {
            return *index;
        }
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&u16_bytes(value.len() as u16));
        bytes.extend_from_slice(value.as_bytes());
        let index = self.push_entry(&bytes);
        self.utf8_cache.insert(value.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&u16_bytes(name));
        self.push_entry(&bytes)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut bytes = vec![12u8];
        bytes.extend_from_slice(&u16_bytes(name));
        bytes.extend_from_slice(&u16_bytes(descriptor));
        self.push_entry(&bytes)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        let mut bytes = vec![tag];
        bytes.extend_from_slice(&u16_bytes(class));
        bytes.extend_from_slice(&u16_bytes(nat));
        self.push_entry(&bytes)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    /// A `REF_invokeStatic` handle to a static method, registered as a
    /// bootstrap method. Returns its index in the `BootstrapMethods` attribute.
    pub fn bootstrap_method(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let method = self.method_ref(owner, name, descriptor);
        let mut bytes = vec![15u8, 6u8];
        bytes.extend_from_slice(&u16_bytes(method));
        let handle = self.push_entry(&bytes);
        self.utf8("BootstrapMethods");
        self.bootstrap_methods.push(handle);
        (self.bootstrap_methods.len() - 1) as u16
    }

    pub fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let nat = self.name_and_type(name, descriptor);
        let mut bytes = vec![18u8];
        bytes.extend_from_slice(&u16_bytes(bootstrap));
        bytes.extend_from_slice(&u16_bytes(nat));
        self.push_entry(&bytes)
    }

    pub fn field(&mut self, access: u16, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.fields.push(MemberInfo {
            access,
            name,
            descriptor,
            code: None,
        });
    }

    pub fn method(&mut self, access: u16, name: &str, descriptor: &str, max_stack: u16, max_locals: u16, code: Vec<u8>) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.utf8("Code");
        self.methods.push(MemberInfo {
            access,
            name,
            descriptor,
            code: Some(CodeInfo {
                max_stack,
                max_locals,
                code,
            }),
        });
    }

    /// `public <init>()V` calling `super()`.
    pub fn default_constructor(&mut self, super_name: &str) {
        let init = self.method_ref(super_name, "<init>", "()V");
        let mut code = vec![op::ALOAD_0, op::INVOKESPECIAL];
        code.extend_from_slice(&u16_bytes(init));
        code.push(op::RETURN);
        self.method(ACC_PUBLIC, "<init>", "()V", 1, 1, code);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&u16_bytes(0));
        let major = if self.bootstrap_methods.is_empty() { 49 } else { 52 };
        out.extend_from_slice(&u16_bytes(major));
        out.extend_from_slice(&u16_bytes(self.pool_count));
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&u16_bytes(self.access));
        out.extend_from_slice(&u16_bytes(self.this_class));
        out.extend_from_slice(&u16_bytes(self.super_class));
        out.extend_from_slice(&u16_bytes(0));

        out.extend_from_slice(&u16_bytes(self.fields.len() as u16));
        for field in &self.fields {
            self.write_member(&mut out, field);
        }
        out.extend_from_slice(&u16_bytes(self.methods.len() as u16));
        for method in &self.methods {
            self.write_member(&mut out, method);
        }
        if self.bootstrap_methods.is_empty() {
            out.extend_from_slice(&u16_bytes(0));
        } else {
            // BootstrapMethods, each entry without static arguments
            out.extend_from_slice(&u16_bytes(1));
            let name = self.utf8_cache.get("BootstrapMethods").copied().unwrap_or(0);
            out.extend_from_slice(&u16_bytes(name));
            let length = 2 + self.bootstrap_methods.len() * 4;
            out.extend_from_slice(&(length as u32).to_be_bytes());
            out.extend_from_slice(&u16_bytes(self.bootstrap_methods.len() as u16));
            for handle in &self.bootstrap_methods {
                out.extend_from_slice(&u16_bytes(*handle));
                out.extend_from_slice(&u16_bytes(0));
            }
        }
        out
    }

    fn write_member(&self, out: &mut Vec<u8>, member: &MemberInfo) {
        out.extend_from_slice(&u16_bytes(member.access));
        out.extend_from_slice(&u16_bytes(member.name));
        out.extend_from_slice(&u16_bytes(member.descriptor));
        match &member.code {
            None => out.extend_from_slice(&u16_bytes(0)),
            Some(code) => {
                out.extend_from_slice(&u16_bytes(1));
                let name = self.utf8_cache.get("Code").copied().unwrap_or(0);
                out.extend_from_slice(&u16_bytes(name));
                let length = 2 + 2 + 4 + code.code.len() + 2 + 2;
                out.extend_from_slice(&(length as u32).to_be_bytes());
                out.extend_from_slice(&u16_bytes(code.max_stack));
                out.extend_from_slice(&u16_bytes(code.max_locals));
                out.extend_from_slice(&(code.code.len() as u32).to_be_bytes());
                out.extend_from_slice(&code.code);
                out.extend_from_slice(&u16_bytes(0));
                out.extend_from_slice(&u16_bytes(0));
            }
        }
    }

    /// Write the class under `root` at its package path.
    pub fn write_to(&self, root: &Path, internal_name: &str) {
        let path = root.join(format!("{}.class", internal_name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, self.to_bytes()).unwrap();
    }
}

/// `final class com.acme.Point { private final int x; Point(int x) { this.x = x; } }`
pub fn point_class() -> ClassAssembler {
    let mut asm = ClassAssembler::new("com/acme/Point", "java/lang/Object").access(ACC_PUBLIC | ACC_FINAL);
    let init = asm.method_ref("java/lang/Object", "<init>", "()V");
    let x = asm.field_ref("com/acme/Point", "x", "I");
    asm.field(ACC_PRIVATE | ACC_FINAL, "x", "I");

    let mut code = vec![op::ALOAD_0, op::INVOKESPECIAL];
    code.extend_from_slice(&u16_bytes(init));
    code.extend_from_slice(&[op::ALOAD_0, op::ILOAD_1, op::PUTFIELD]);
    code.extend_from_slice(&u16_bytes(x));
    code.push(op::RETURN);
    asm.method(ACC_PUBLIC, "<init>", "(I)V", 2, 2, code);

    let mut getter = vec![op::ALOAD_0, op::GETFIELD];
    getter.extend_from_slice(&u16_bytes(x));
    getter.push(op::IRETURN);
    asm.method(ACC_PUBLIC, "getX", "()I", 1, 1, getter);
    asm
}

/// `record com.acme.Point(int x)`: the generated `toString` passes `this`
/// to an `ObjectMethods` call site.
pub fn point_record() -> ClassAssembler {
    let mut asm = ClassAssembler::new("com/acme/Point", "java/lang/Record").access(ACC_PUBLIC | ACC_FINAL);
    let init = asm.method_ref("java/lang/Record", "<init>", "()V");
    let x = asm.field_ref("com/acme/Point", "x", "I");
    asm.field(ACC_PRIVATE | ACC_FINAL, "x", "I");

    let mut code = vec![op::ALOAD_0, op::INVOKESPECIAL];
    code.extend_from_slice(&u16_bytes(init));
    code.extend_from_slice(&[op::ALOAD_0, op::ILOAD_1, op::PUTFIELD]);
    code.extend_from_slice(&u16_bytes(x));
    code.push(op::RETURN);
    asm.method(ACC_PUBLIC, "<init>", "(I)V", 2, 2, code);

    let bootstrap = asm.bootstrap_method(
        "java/lang/runtime/ObjectMethods",
        "bootstrap",
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/TypeDescriptor;Ljava/lang/Class;Ljava/lang/String;[Ljava/lang/invoke/MethodHandle;)Ljava/lang/Object;",
    );
    let site = asm.invoke_dynamic(bootstrap, "toString", "(Lcom/acme/Point;)Ljava/lang/String;");
    let mut to_string = vec![op::ALOAD_0, op::INVOKEDYNAMIC];
    to_string.extend_from_slice(&u16_bytes(site));
    to_string.extend_from_slice(&[0, 0, op::ARETURN]);
    asm.method(ACC_PUBLIC | ACC_FINAL, "toString", "()Ljava/lang/String;", 1, 1, to_string);
    asm
}

/// `class com.acme.Counter { public int count; public void reset() { count = 0; } }`
pub fn counter_class() -> ClassAssembler {
    let mut asm = ClassAssembler::new("com/acme/Counter", "java/lang/Object");
    let count = asm.field_ref("com/acme/Counter", "count", "I");
    asm.field(ACC_PUBLIC, "count", "I");
    asm.default_constructor("java/lang/Object");

    let mut reset = vec![op::ALOAD_0, op::ICONST_0, op::PUTFIELD];
    reset.extend_from_slice(&u16_bytes(count));
    reset.push(op::RETURN);
    asm.method(ACC_PUBLIC, "reset", "()V", 2, 1, reset);
    asm
}

/// Put class files into a jar at `path`.
pub fn write_jar(path: &Path, classes: &[(&str, Vec<u8>)]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer.write_all(b"Manifest-Version: 1.0\n\n").unwrap();
    for (name, bytes) in classes {
        writer.start_file(format!("{}.class", name), options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

/// `super(); return;` for a class extending `super_name`.
pub fn super_call(super_name: &str) -> Vec<Instruction> {
    vec![
        Instruction::aload(0),
        Instruction::invokespecial(super_name, "<init>", "()V"),
    ]
}

/// A final class with a constructor taking `param` and storing it into `field`.
pub fn holder(name: &str, field: &str, descriptor: &str, body: Vec<Instruction>) -> ClassFacts {
    let mut code = super_call("java.lang.Object");
    code.push(Instruction::aload(0));
    code.extend(body);
    code.push(Instruction::putfield(name, field, descriptor));
    code.push(Instruction::return_void());
    ClassBuilder::new(name)
        .final_class()
        .field(field, descriptor, AccessFlags::PRIVATE | AccessFlags::FINAL)
        .method(
            MethodBuilder::constructor(&format!("({})V", descriptor))
                .code(code)
                .build(),
        )
        .build()
}
