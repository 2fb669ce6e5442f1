//! Recursive-descent parser for module outlines

use std::sync::Arc;

use crate::ast::{
    AccessModifier, Declaration, DeclarationKind, EmbedDefinition, FieldDefinition, ImportStatement, ImportTargets,
    ImportedName, InterfaceDefinition, LinkKind, NativeType, OperationDeclaration, PortDefinition, ProcedureDefinition,
    Program, ProgramItem, ServiceDefinition, ServiceItem, SourceContext, Statement, SymbolLink, TypeDefinition,
};
use crate::import_path::ImportPath;
use crate::uri::ModuleUri;

use super::lexer::{tokenize, Lexeme, Token};
use super::OutlineError;

type ParseResult<T> = Result<T, OutlineError>;

/// Parse source text into a program
pub fn parse_program(uri: &ModuleUri, source: &str) -> ParseResult<Program> {
    let tokens = tokenize(source).map_err(|err| OutlineError::InvalidToken {
        uri: uri.clone(),
        line: err.line,
        text: err.text,
    })?;
    let mut parser = Parser {
        uri: uri.clone(),
        tokens,
        pos: 0,
    };

    let mut items = Vec::new();
    while parser.peek().is_some() {
        items.push(parser.parse_item()?);
    }
    Ok(Program::new(uri.clone(), items))
}

struct Parser<'s> {
    uri: ModuleUri,
    tokens: Vec<Lexeme<'s>>,
    pos: usize,
}

impl<'s> Parser<'s> {
    // ---- token helpers ----

    fn peek(&self) -> Option<Lexeme<'s>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_token(&self) -> Option<Token> {
        self.peek().map(|l| l.token)
    }

    fn peek_token_at(&self, offset: usize) -> Option<Token> {
        self.tokens.get(self.pos + offset).map(|l| l.token)
    }

    fn at(&self, token: Token) -> bool {
        self.peek_token() == Some(token)
    }

    fn bump(&mut self) -> Option<Lexeme<'s>> {
        let lexeme = self.peek();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> ParseResult<Lexeme<'s>> {
        match self.peek() {
            Some(lexeme) if lexeme.token == token => {
                self.pos += 1;
                Ok(lexeme)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// An identifier or keyword
    fn word(&mut self, expected: &str) -> ParseResult<Lexeme<'s>> {
        match self.peek() {
            Some(lexeme) if lexeme.token.is_word() => {
                self.pos += 1;
                Ok(lexeme)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> OutlineError {
        match self.peek() {
            Some(lexeme) => OutlineError::Unexpected {
                uri: self.uri.clone(),
                line: lexeme.line,
                expected: expected.to_string(),
                found: lexeme.text.to_string(),
            },
            None => OutlineError::UnexpectedEof {
                uri: self.uri.clone(),
                expected: expected.to_string(),
            },
        }
    }

    fn context(&self, line: u32) -> SourceContext {
        SourceContext::new(self.uri.clone(), line)
    }

    /// Skip a balanced `(...)`, `{...}` or `[...]` group starting at the cursor
    fn skip_group(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            let Some(lexeme) = self.bump() else {
                return Err(self.unexpected("closing bracket"));
            };
            match lexeme.token {
                Token::LeftBrace | Token::LeftParen | Token::LeftBracket => depth += 1,
                Token::RightBrace | Token::RightParen | Token::RightBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    // ---- top level ----

    fn parse_item(&mut self) -> ParseResult<ProgramItem> {
        if self.at(Token::From) {
            return self.parse_import().map(ProgramItem::Import);
        }

        let access = if self.eat(Token::Private) {
            AccessModifier::Private
        } else {
            self.eat(Token::Public);
            AccessModifier::Public
        };

        let declaration = match self.peek_token() {
            Some(Token::Type) => self.parse_type_declaration(access)?,
            Some(Token::Interface) => self.parse_interface(access)?,
            Some(Token::Define) => self.parse_procedure(access)?,
            Some(Token::Service) => self.parse_service(access)?,
            _ => return Err(self.unexpected("import or declaration")),
        };
        Ok(ProgramItem::Declaration(Arc::new(declaration)))
    }

    /// `from <path> import *` or `from <path> import a, b as c`
    fn parse_import(&mut self) -> ParseResult<ImportStatement> {
        let from = self.expect(Token::From, "from")?;

        let mut parts = Vec::new();
        while self.eat(Token::Dot) {
            parts.push(String::new());
        }
        parts.push(self.word("module name")?.text.to_string());
        while self.eat(Token::Dot) {
            parts.push(self.word("module name")?.text.to_string());
        }

        self.expect(Token::Import, "import")?;
        let targets = if self.eat(Token::Star) {
            ImportTargets::Wildcard
        } else {
            let mut names = Vec::new();
            loop {
                let original = self.word("imported name")?.text;
                let name = if self.eat(Token::As) {
                    ImportedName::aliased(original, self.word("alias")?.text)
                } else {
                    ImportedName::new(original)
                };
                names.push(name);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
            ImportTargets::Symbols(names)
        };

        Ok(ImportStatement {
            context: self.context(from.line),
            path: ImportPath::new(parts),
            targets,
        })
    }

    // ---- types ----

    /// `type N: <type>` or `type N { fields }`
    fn parse_type_declaration(&mut self, access: AccessModifier) -> ParseResult<Declaration> {
        let keyword = self.expect(Token::Type, "type")?;
        let name = self.word("type name")?;
        let ty = if self.eat(Token::Colon) {
            self.parse_type()?
        } else if self.at(Token::LeftBrace) {
            TypeDefinition::Inline {
                base: NativeType::Void,
                fields: self.parse_fields()?,
            }
        } else {
            return Err(self.unexpected(": or {"));
        };
        Ok(Declaration {
            name: name.text.to_string(),
            access,
            context: self.context(keyword.line),
            kind: DeclarationKind::Type(ty),
        })
    }

    /// `A | B | ...`
    fn parse_type(&mut self) -> ParseResult<TypeDefinition> {
        let first = self.parse_type_atom()?;
        if !self.at(Token::Pipe) {
            return Ok(first);
        }
        let mut options = vec![first];
        while self.eat(Token::Pipe) {
            options.push(self.parse_type_atom()?);
        }
        Ok(TypeDefinition::Choice(options))
    }

    fn parse_type_atom(&mut self) -> ParseResult<TypeDefinition> {
        if self.at(Token::LeftBrace) {
            return Ok(TypeDefinition::Inline {
                base: NativeType::Void,
                fields: self.parse_fields()?,
            });
        }

        let name = self.word("type")?;
        match NativeType::from_keyword(name.text) {
            Some(base) => {
                // Native types may carry a length refinement, e.g. string(length([0, 10]))
                if self.at(Token::LeftParen) {
                    self.skip_group()?;
                }
                if self.at(Token::LeftBrace) {
                    Ok(TypeDefinition::Inline {
                        base,
                        fields: self.parse_fields()?,
                    })
                } else {
                    Ok(TypeDefinition::Native(base))
                }
            }
            None => Ok(TypeDefinition::Link(SymbolLink::new(
                name.text,
                LinkKind::Type,
                self.context(name.line),
            ))),
        }
    }

    /// `{ a: int, .b[0, 1]: T }`
    fn parse_fields(&mut self) -> ParseResult<Vec<FieldDefinition>> {
        self.expect(Token::LeftBrace, "{")?;
        let mut fields = Vec::new();
        while !self.eat(Token::RightBrace) {
            if self.eat(Token::Comma) || self.eat(Token::Semicolon) {
                continue;
            }
            self.eat(Token::Dot);
            let name = match self.peek() {
                Some(lexeme) if lexeme.token == Token::StringLiteral => {
                    self.pos += 1;
                    lexeme.text.trim_matches('"').to_string()
                }
                _ => self.word("field name")?.text.to_string(),
            };

            // Cardinality: [min, max], ? or *
            if self.at(Token::LeftBracket) {
                self.skip_group()?;
            } else if !self.eat(Token::Question) {
                self.eat(Token::Star);
            }

            self.expect(Token::Colon, ":")?;
            let ty = self.parse_type()?;
            fields.push(FieldDefinition { name, ty });
        }
        Ok(fields)
    }

    // ---- interfaces ----

    fn parse_interface(&mut self, access: AccessModifier) -> ParseResult<Declaration> {
        let keyword = self.expect(Token::Interface, "interface")?;
        let name = self.word("interface name")?;
        self.expect(Token::LeftBrace, "{")?;

        let mut operations = Vec::new();
        while !self.eat(Token::RightBrace) {
            if self.eat(Token::Comma) || self.eat(Token::Semicolon) {
                continue;
            }
            // RequestResponse: / OneWay: section labels
            if self.peek_token_at(1) == Some(Token::Colon) {
                self.word("operation kind")?;
                self.pos += 1;
                continue;
            }
            operations.push(self.parse_operation()?);
        }

        Ok(Declaration {
            name: name.text.to_string(),
            access,
            context: self.context(keyword.line),
            kind: DeclarationKind::Interface(InterfaceDefinition { operations }),
        })
    }

    /// `op(Request)` or `op(Request)(Response) throws F F2(T)`
    fn parse_operation(&mut self) -> ParseResult<OperationDeclaration> {
        let name = self.word("operation name")?.text.to_string();
        let request = self.parse_parenthesized_type()?;
        let response = if self.at(Token::LeftParen) {
            Some(self.parse_parenthesized_type()?)
        } else {
            None
        };

        let mut faults = Vec::new();
        if self.eat(Token::Throws) {
            while self.peek().is_some_and(|l| l.token.is_word()) && self.peek_token_at(1) != Some(Token::Colon) {
                let fault = self.word("fault name")?.text.to_string();
                let ty = if self.at(Token::LeftParen) {
                    self.parse_parenthesized_type()?
                } else {
                    TypeDefinition::Native(NativeType::Undefined)
                };
                faults.push((fault, ty));
            }
        }

        Ok(OperationDeclaration {
            name,
            request,
            response,
            faults,
        })
    }

    fn parse_parenthesized_type(&mut self) -> ParseResult<TypeDefinition> {
        self.expect(Token::LeftParen, "(")?;
        let ty = self.parse_type()?;
        self.expect(Token::RightParen, ")")?;
        Ok(ty)
    }

    // ---- behaviour ----

    fn parse_procedure(&mut self, access: AccessModifier) -> ParseResult<Declaration> {
        let keyword = self.expect(Token::Define, "define")?;
        let name = self.word("procedure name")?;
        let body = self.parse_block()?;
        Ok(Declaration {
            name: name.text.to_string(),
            access,
            context: self.context(keyword.line),
            kind: DeclarationKind::Procedure(ProcedureDefinition { body }),
        })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(Token::LeftBrace, "{")?;
        let mut body = Vec::new();
        while !self.eat(Token::RightBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("}"));
            }
            if let Some(statement) = self.parse_statement()? {
                body.push(statement);
            }
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Option<Statement>> {
        match self.peek_token() {
            Some(Token::Semicolon) => {
                self.pos += 1;
                Ok(None)
            }
            Some(Token::LeftBrace) => Ok(Some(Statement::Block(self.parse_block()?))),
            Some(Token::Identifier)
                if matches!(
                    self.peek_token_at(1),
                    Some(Token::Semicolon) | Some(Token::RightBrace)
                ) =>
            {
                let name = self.word("procedure name")?.text.to_string();
                self.eat(Token::Semicolon);
                Ok(Some(Statement::Call(name)))
            }
            _ => self.parse_opaque_statement().map(Some),
        }
    }

    /// Skip a statement without references, stopping before a nested block
    ///
    /// An `x instanceof T` check found on the way becomes the statement.
    fn parse_opaque_statement(&mut self) -> ParseResult<Statement> {
        let mut last_word: Option<&'s str> = None;
        let mut consumed = false;
        while let Some(lexeme) = self.peek() {
            match lexeme.token {
                Token::Semicolon => {
                    self.pos += 1;
                    break;
                }
                Token::LeftBrace | Token::RightBrace => break,
                Token::InstanceOf => {
                    self.pos += 1;
                    let ty = self.parse_type_atom()?;
                    self.eat(Token::Semicolon);
                    return Ok(Statement::InstanceOf {
                        variable: last_word.unwrap_or_default().to_string(),
                        ty,
                    });
                }
                token => {
                    if token.is_word() {
                        last_word = Some(lexeme.text);
                    }
                    self.pos += 1;
                }
            }
            consumed = true;
        }
        if !consumed {
            return Err(self.unexpected("statement"));
        }
        Ok(Statement::Opaque)
    }

    // ---- services ----

    /// `service S(p: T) { ports, embeds, main }`
    fn parse_service(&mut self, access: AccessModifier) -> ParseResult<Declaration> {
        let keyword = self.expect(Token::Service, "service")?;
        let name = self.word("service name")?;

        let mut service = ServiceDefinition::default();
        if self.eat(Token::LeftParen) {
            self.word("parameter name")?;
            self.expect(Token::Colon, ":")?;
            service.parameter = Some(self.parse_type()?);
            self.expect(Token::RightParen, ")")?;
        }

        self.expect(Token::LeftBrace, "{")?;
        while !self.eat(Token::RightBrace) {
            match self.peek_token() {
                Some(Token::InputPort) => {
                    self.pos += 1;
                    service.items.push(ServiceItem::InputPort(self.parse_port()?));
                }
                Some(Token::OutputPort) => {
                    self.pos += 1;
                    service.items.push(ServiceItem::OutputPort(self.parse_port()?));
                }
                Some(Token::Embed) => service.items.push(ServiceItem::Embed(self.parse_embed()?)),
                Some(Token::Main) => {
                    self.pos += 1;
                    let body = self.parse_block()?;
                    service.items.push(ServiceItem::Main(ProcedureDefinition { body }));
                }
                Some(Token::Comma) | Some(Token::Semicolon) => self.pos += 1,
                Some(token) if token.is_word() => self.skip_service_member()?,
                _ => return Err(self.unexpected("service member")),
            }
        }

        Ok(Declaration {
            name: name.text.to_string(),
            access,
            context: self.context(keyword.line),
            kind: DeclarationKind::Service(service),
        })
    }

    /// `execution: concurrent`, `init { ... }` and other members without links
    fn skip_service_member(&mut self) -> ParseResult<()> {
        self.word("service member")?;
        if self.eat(Token::Colon) {
            self.bump();
        }
        if matches!(self.peek_token(), Some(Token::LeftBrace) | Some(Token::LeftParen)) {
            self.skip_group()?;
        }
        Ok(())
    }

    /// `Name { location: "..." protocol: sodep interfaces: A, B }`
    fn parse_port(&mut self) -> ParseResult<PortDefinition> {
        let name = self.word("port name")?.text.to_string();
        self.expect(Token::LeftBrace, "{")?;

        let mut port = PortDefinition {
            name,
            location: None,
            interfaces: Vec::new(),
        };
        while !self.eat(Token::RightBrace) {
            if self.eat(Token::Comma) || self.eat(Token::Semicolon) {
                continue;
            }
            let key = self.word("port property")?.text;
            self.expect(Token::Colon, ":")?;

            if key.eq_ignore_ascii_case("interfaces") {
                loop {
                    let interface = self.word("interface name")?;
                    port.interfaces.push(SymbolLink::new(
                        interface.text,
                        LinkKind::Interface,
                        self.context(interface.line),
                    ));
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
            } else if key.eq_ignore_ascii_case("location") {
                let location = self.expect(Token::StringLiteral, "location string")?;
                port.location = Some(location.text.trim_matches('"').to_string());
            } else {
                // protocol: sodep, protocol: http { ... }
                if self.bump().is_none() {
                    return Err(self.unexpected("port property value"));
                }
                if self.at(Token::LeftBrace) {
                    self.skip_group()?;
                }
            }
        }
        Ok(port)
    }

    /// `embed S in Port`, `embed S(args) as Port` or `embed S`
    fn parse_embed(&mut self) -> ParseResult<EmbedDefinition> {
        self.expect(Token::Embed, "embed")?;
        let service = self.word("service name")?;
        let link = SymbolLink::new(service.text, LinkKind::Service, self.context(service.line));
        if self.at(Token::LeftParen) {
            self.skip_group()?;
        }
        let port = if self.eat(Token::In) || self.eat(Token::As) {
            Some(self.word("port name")?.text.to_string())
        } else {
            None
        };
        Ok(EmbedDefinition::new(link, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> ModuleUri {
        ModuleUri::parse("file:///p/main.ol").unwrap()
    }

    fn parse(source: &str) -> Program {
        parse_program(&uri(), source).unwrap()
    }

    #[test]
    fn test_imports() {
        let program = parse("from ..shared.types import *\nfrom .b import x, y as z\nfrom lib import T\n");
        let imports: Vec<_> = program.imports().collect();
        assert_eq!(imports.len(), 3);

        assert_eq!(imports[0].path, ImportPath::parse("..shared.types"));
        assert!(matches!(imports[0].targets, ImportTargets::Wildcard));

        assert_eq!(imports[1].path.to_string(), ".b");
        assert_eq!(imports[1].context.line, 2);
        let ImportTargets::Symbols(names) = &imports[1].targets else {
            panic!("expected named imports");
        };
        assert_eq!(names, &vec![ImportedName::new("x"), ImportedName::aliased("y", "z")]);

        assert!(!imports[2].path.is_relative());
    }

    #[test]
    fn test_type_declarations() {
        let program = parse(
            "type A: int\n\
             private type B: string | A\n\
             type C { name: string, .tags[0, *]: string, child?: C }\n\
             type D: void { value: undefined }\n",
        );

        let a = program.declaration("A").unwrap();
        assert!(matches!(a.kind, DeclarationKind::Type(TypeDefinition::Native(NativeType::Int))));

        let b = program.declaration("B").unwrap();
        assert_eq!(b.access, AccessModifier::Private);
        let DeclarationKind::Type(TypeDefinition::Choice(options)) = &b.kind else {
            panic!("expected a choice type");
        };
        assert!(matches!(&options[1], TypeDefinition::Link(link) if link.name == "A"));

        let c = program.declaration("C").unwrap();
        let DeclarationKind::Type(TypeDefinition::Inline { base, fields }) = &c.kind else {
            panic!("expected an inline type");
        };
        assert_eq!(*base, NativeType::Void);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "tags", "child"]);

        let d = program.declaration("D").unwrap();
        assert_eq!(d.context.line, 4);
        assert!(matches!(
            d.kind,
            DeclarationKind::Type(TypeDefinition::Inline { base: NativeType::Void, .. })
        ));
    }

    #[test]
    fn test_interface() {
        let program = parse(
            "interface Calc {\n\
               RequestResponse: sum(Numbers)(int) throws Overflow Invalid(Reason), ping(void)(void)\n\
               OneWay: log(string)\n\
             }\n",
        );
        let decl = program.declaration("Calc").unwrap();
        let DeclarationKind::Interface(iface) = &decl.kind else {
            panic!("expected an interface");
        };
        assert_eq!(iface.operations.len(), 3);

        let sum = &iface.operations[0];
        assert_eq!(sum.name, "sum");
        assert!(matches!(&sum.request, TypeDefinition::Link(link) if link.name == "Numbers"));
        assert_eq!(sum.faults.len(), 2);
        assert_eq!(sum.faults[1].0, "Invalid");
        assert!(iface.operations[2].response.is_none());
    }

    #[test]
    fn test_service() {
        let program = parse(
            r#"
service Calculator(config: Config) {
    execution: concurrent
    embed Logger in LogPort
    inputPort Api {
        location: "socket://localhost:8000"
        protocol: http { format = "json" }
        interfaces: Calc, Admin
    }
    outputPort LogPort { interfaces: LogApi }
    init { setup }
    main {
        [ sum(req)(res) {
            if (req instanceof Numbers) { res = 1 }
            validate;
        } ]
    }
}
"#,
        );
        let decl = program.declaration("Calculator").unwrap();
        let DeclarationKind::Service(service) = &decl.kind else {
            panic!("expected a service");
        };
        assert!(matches!(&service.parameter, Some(TypeDefinition::Link(link)) if link.name == "Config"));

        let mut links = Vec::new();
        crate::ast::for_each_link(decl, &mut |link| links.push((link.name.clone(), link.kind)));
        assert_eq!(
            links,
            vec![
                ("Config".to_string(), LinkKind::Type),
                ("Logger".to_string(), LinkKind::Service),
                ("Calc".to_string(), LinkKind::Interface),
                ("Admin".to_string(), LinkKind::Interface),
                ("LogApi".to_string(), LinkKind::Interface),
                ("Numbers".to_string(), LinkKind::Type),
            ]
        );

        let ServiceItem::InputPort(api) = &service.items[1] else {
            panic!("expected input port");
        };
        assert_eq!(api.location.as_deref(), Some("socket://localhost:8000"));
    }

    #[test]
    fn test_procedure_body() {
        let program = parse("define check { x = 1; { y instanceof T }; other }\n");
        let decl = program.declaration("check").unwrap();
        let DeclarationKind::Procedure(proc) = &decl.kind else {
            panic!("expected a procedure");
        };
        assert!(matches!(proc.body[0], Statement::Opaque));
        let Statement::Block(inner) = &proc.body[1] else {
            panic!("expected a block");
        };
        assert!(matches!(&inner[0], Statement::InstanceOf { variable, .. } if variable == "y"));
        assert!(matches!(&proc.body[2], Statement::Call(name) if name == "other"));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = parse_program(&uri(), "type A: int\ntype : B\n").unwrap_err();
        match err {
            OutlineError::Unexpected { line, expected, found, .. } => {
                assert_eq!(line, 2);
                assert_eq!(expected, "type name");
                assert_eq!(found, ":");
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let err = parse_program(&uri(), "interface I { op(T)").unwrap_err();
        assert!(matches!(err, OutlineError::UnexpectedEof { .. }));
    }
}
